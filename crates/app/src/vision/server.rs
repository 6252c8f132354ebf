//! Actix Web surface for the served mode: gesture polling, the MJPEG feed,
//! and Prometheus metrics.
//!
//! The server runs on a dedicated thread with its own actix `System` so the
//! capture loop never shares a runtime with request handling.

use std::time::Duration;

use actix_cors::Cors;
use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result, anyhow};
use async_stream::stream;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::vision::{
    config::StreamConfig,
    data::{GestureResponse, SharedHandle},
    telemetry,
};

pub(crate) const MJPEG_BOUNDARY: &str = "frame";

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) shared: SharedHandle,
    pub(crate) stream_interval: Duration,
}

/// Handle for the gesture server thread.
#[derive(Default)]
pub(crate) struct GestureServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl GestureServer {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// CORS policy admitting GET requests from exactly one origin.
pub(crate) fn cors(origin: &str) -> Cors {
    Cors::default()
        .allowed_origin(origin)
        .allowed_methods(vec!["GET"])
        .allow_any_header()
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/gesture", web::get().to(gesture_handler))
        .route("/video", web::get().to(video_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Bind the server on its own thread. Bind failures are returned to the caller.
pub(crate) fn spawn_gesture_server(
    shared: SharedHandle,
    config: &StreamConfig,
) -> Result<GestureServer> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<std::result::Result<(), String>>(1);
    let bind_addr = (config.host.clone(), config.port);
    let origin = config.cors_origin.clone();
    let stream_interval = config.interval;

    let handle = telemetry::spawn_thread("gesture-http-server", move || {
        let outcome = actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(move || {
                App::new()
                    .wrap(cors(&origin))
                    .app_data(web::Data::new(ServerState {
                        shared: shared.clone(),
                        stream_interval,
                    }))
                    .configure(routes)
            })
            .workers(2)
            .shutdown_timeout(1)
            .bind(bind_addr.clone());

            let server = match server {
                Ok(server) => server.run(),
                Err(err) => {
                    let _ = ready_tx.send(Err(format!(
                        "failed to bind {}:{}: {err}",
                        bind_addr.0, bind_addr.1
                    )));
                    return Ok(());
                }
            };
            let _ = ready_tx.send(Ok(()));

            let srv_handle = server.handle();
            actix_web::rt::spawn(async move {
                let _ = shutdown_rx.await;
                srv_handle.stop(true).await;
            });

            server.await
        });
        if let Err(err) = outcome {
            error!("HTTP server error: {err}");
        }
    })
    .context("Failed to spawn gesture server thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(message)) => {
            let _ = handle.join();
            return Err(anyhow!(message));
        }
        Err(_) => {
            let _ = handle.join();
            return Err(anyhow!("gesture server thread exited before binding"));
        }
    }

    info!(
        "Gesture API available at http://{}:{}/gesture and /video",
        config.host, config.port
    );
    Ok(GestureServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Current gesture label or `null`.
async fn gesture_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok().json(GestureResponse {
        gesture: state.shared.gesture(),
    })
}

/// One multipart part carrying a JPEG frame.
pub(crate) fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(jpeg.len() + 64);
    payload.extend_from_slice(b"--");
    payload.extend_from_slice(MJPEG_BOUNDARY.as_bytes());
    payload.extend_from_slice(b"\r\n");
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

/// Keeps the connected-clients gauge in sync with live streams.
struct StreamClient;

impl StreamClient {
    fn connect() -> Self {
        metrics::gauge!("gesture_stream_clients").increment(1.0);
        debug!("MJPEG client connected");
        StreamClient
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        metrics::gauge!("gesture_stream_clients").decrement(1.0);
        debug!("MJPEG client disconnected");
    }
}

/// Stream the latest published frame on a fixed cadence, regardless of how
/// fast the capture loop produces them.
async fn video_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.clone();
    let stream = stream! {
        let _client = StreamClient::connect();
        let mut interval = actix_web::rt::time::interval(state.stream_interval);
        loop {
            interval.tick().await;
            if let Some(jpeg) = state.shared.latest_frame() {
                yield Ok::<Bytes, actix_web::Error>(mjpeg_part(&jpeg));
            }
        }
    };

    HttpResponse::Ok()
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header((
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"),
        ))
        .streaming(stream)
}

async fn metrics_handler() -> HttpResponse {
    render_metrics(telemetry::prometheus_handle())
}

/// Prometheus text exposition, or 204 when no recorder is installed.
fn render_metrics(handle: Option<&PrometheusHandle>) -> HttpResponse {
    match handle {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NoContent().finish(),
    }
}
