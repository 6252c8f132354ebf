//! Tracing subscriber, Prometheus recorder, and thread helpers.

use std::{io, sync::OnceLock, thread, time::Duration};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static PROM_UPKEEP_THREAD: OnceLock<thread::JoinHandle<()>> = OnceLock::new();

/// Install the global fmt subscriber. `RUST_LOG` overrides the `info` default.
pub(crate) fn init_subscriber() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_filter(env_filter),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init();
}

/// Ensure the global metrics recorder is installed and return the Prometheus handle.
pub(crate) fn init_metrics_recorder() -> &'static PrometheusHandle {
    PROM_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        if let Err(err) = metrics::set_global_recorder(recorder) {
            tracing::warn!("metrics recorder already installed: {err}");
        }
        describe_metrics();

        let upkeep_handle = handle.clone();
        let upkeep = spawn_thread("prometheus-upkeep", move || {
            loop {
                thread::sleep(Duration::from_secs(5));
                upkeep_handle.run_upkeep();
            }
        });
        match upkeep {
            Ok(join) => {
                let _ = PROM_UPKEEP_THREAD.set(join);
            }
            Err(err) => tracing::warn!("failed to spawn prometheus upkeep thread: {err}"),
        }

        handle
    })
}

fn describe_metrics() {
    metrics::describe_counter!("gesture_frames_total", "Frames read from the camera");
    metrics::describe_counter!(
        "gesture_capture_skipped_total",
        "Camera reads that returned no frame"
    );
    metrics::describe_counter!(
        "gesture_detector_errors_total",
        "Frames whose landmark detection failed"
    );
    metrics::describe_histogram!(
        "gesture_detector_seconds",
        metrics::Unit::Seconds,
        "Landmark detection latency per frame"
    );
    metrics::describe_histogram!("gesture_hands_detected", "Hands reported per frame");
    metrics::describe_counter!(
        "gesture_published_total",
        "Gestures written to the shared state, by label"
    );
    metrics::describe_gauge!("gesture_stream_clients", "Connected MJPEG clients");
}

/// Access the Prometheus handle when already initialised.
pub(crate) fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROM_HANDLE.get()
}

/// Spawn a thread that inherits the current tracing dispatcher.
pub(crate) fn spawn_thread<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::Builder::new()
        .name(name.into())
        .spawn(move || tracing::dispatcher::with_default(&dispatch, f))
}
