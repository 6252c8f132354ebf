//! Capture loop shared by the windowed and served entry points.
//!
//! One producer reads a frame, runs the landmark detector synchronously,
//! draws the skeleton, classifies the first qualifying hand, and hands the
//! result to a [`FrameSink`]. The loop is paced only by the camera and the
//! detector.

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use anyhow::{Context, Result};
use image::RgbImage;
use ml_core::{DetectorError, Gesture, HandLandmarker, first_match, open_landmarker};
use tracing::{debug, error, info, warn};
use video_ingest::{Camera, Frame, FrameSource};

use crate::vision::{
    annotation::{LandmarkStyle, draw_hand, frame_to_rgb},
    config::{CaptureConfig, DisplayConfig, StreamConfig},
    data::SharedState,
    display::DisplaySink,
    server::spawn_gesture_server,
    sink::{FrameSink, PublishSink, SinkControl},
    telemetry,
};

#[derive(Clone, Copy, Debug)]
pub(crate) struct ProcessOptions {
    pub(crate) mirror: bool,
    pub(crate) style: LandmarkStyle,
}

impl From<&CaptureConfig> for ProcessOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            mirror: config.mirror,
            style: config.style,
        }
    }
}

/// Annotated frame and its classification.
pub(crate) struct ProcessedFrame {
    pub(crate) image: RgbImage,
    pub(crate) gesture: Option<Gesture>,
    pub(crate) hands: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StopReason {
    SourceClosed,
    Sink,
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LoopSummary {
    pub(crate) frames: u64,
    pub(crate) skipped: u64,
    pub(crate) stopped_by: StopReason,
}

/// Detect, draw, and classify a single frame.
///
/// A detector error that leaves the backend unusable is returned as a
/// [`DetectorError`]; any other detection failure counts as no hands.
pub(crate) fn process_frame<D>(
    frame: &Frame,
    detector: &mut D,
    options: &ProcessOptions,
) -> Result<ProcessedFrame>
where
    D: HandLandmarker + ?Sized,
{
    let mut image = frame_to_rgb(frame, options.mirror)?;

    let detect_start = Instant::now();
    let hands = match tracing::info_span!("detector.detect").in_scope(|| detector.detect(&image)) {
        Ok(hands) => hands,
        Err(err) if err.is_fatal() => return Err(err.into()),
        Err(err) => {
            error!("Hand detection failed: {err}");
            metrics::counter!("gesture_detector_errors_total").increment(1);
            Vec::new()
        }
    };
    metrics::histogram!("gesture_detector_seconds").record(detect_start.elapsed().as_secs_f64());
    metrics::histogram!("gesture_hands_detected").record(hands.len() as f64);

    for hand in &hands {
        draw_hand(&mut image, hand, &options.style);
    }
    let gesture = first_match(&hands);

    Ok(ProcessedFrame {
        image,
        gesture,
        hands: hands.len(),
    })
}

/// Run until the source closes, the sink stops, or `shutdown` is raised.
///
/// Read misses and read errors are skipped without backoff. Losing the
/// detector backend ends the loop with an error.
pub(crate) fn run_acquisition<S, D, K>(
    source: &mut S,
    detector: &mut D,
    sink: &mut K,
    options: &ProcessOptions,
    shutdown: &AtomicBool,
) -> Result<LoopSummary>
where
    S: FrameSource + ?Sized,
    D: HandLandmarker + ?Sized,
    K: FrameSink + ?Sized,
{
    let mut frames: u64 = 0;
    let mut skipped: u64 = 0;
    let mut last_gesture: Option<Gesture> = None;

    let stopped_by = loop {
        if shutdown.load(Ordering::Relaxed) {
            break StopReason::Shutdown;
        }
        if !source.is_open() {
            break StopReason::SourceClosed;
        }

        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                skipped = skipped.wrapping_add(1);
                metrics::counter!("gesture_capture_skipped_total").increment(1);
                debug!("Empty frame, skipping");
                continue;
            }
            Err(err) => {
                skipped = skipped.wrapping_add(1);
                metrics::counter!("gesture_capture_skipped_total").increment(1);
                debug!("Camera read failed ({err}), skipping");
                continue;
            }
        };

        frames = frames.wrapping_add(1);
        let frame_span = tracing::info_span!(
            "frame",
            frame = frames,
            width = frame.width,
            height = frame.height,
            timestamp = frame.timestamp_ms
        );
        let _frame_guard = frame_span.enter();
        metrics::counter!("gesture_frames_total").increment(1);

        let processed = match process_frame(&frame, detector, options) {
            Ok(processed) => processed,
            Err(err) if err.is::<DetectorError>() => {
                return Err(err.context("Hand landmark detector stopped"));
            }
            Err(err) => {
                warn!("Dropping malformed frame #{frames}: {err:#}");
                continue;
            }
        };

        if processed.gesture != last_gesture {
            debug!(
                hands = processed.hands,
                "gesture changed: {} -> {}",
                label(last_gesture),
                label(processed.gesture)
            );
            last_gesture = processed.gesture;
        }

        match sink.consume(&processed.image, processed.gesture)? {
            SinkControl::Continue => {}
            SinkControl::Stop => break StopReason::Sink,
        }
    };

    Ok(LoopSummary {
        frames,
        skipped,
        stopped_by,
    })
}

fn label(gesture: Option<Gesture>) -> &'static str {
    gesture.map_or("none", Gesture::label)
}

/// Flag raised by Ctrl+C; the handler is installed once per process.
fn shutdown_flag() -> Arc<AtomicBool> {
    static SHUTDOWN: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    SHUTDOWN
        .get_or_init(|| {
            let shutdown = Arc::new(AtomicBool::new(false));
            let handler_shutdown = shutdown.clone();
            if let Err(err) = ctrlc::set_handler(move || {
                handler_shutdown.store(true, Ordering::SeqCst);
            }) {
                warn!("Failed to install Ctrl+C handler: {err}");
            }
            shutdown
        })
        .clone()
}

fn open_pipeline(capture: &CaptureConfig) -> Result<(Camera, Box<dyn HandLandmarker + Send>)> {
    let detector = open_landmarker(&capture.model_path, capture.detector, &capture.bridge)
        .with_context(|| {
            format!(
                "Failed to load hand landmark model {}",
                capture.model_path.display()
            )
        })?;
    let camera = Camera::open(&capture.camera_uri, capture.camera)
        .with_context(|| format!("Failed to open camera {}", capture.camera_uri))?;
    Ok((camera, detector))
}

fn log_summary(summary: &LoopSummary) {
    info!(
        frames = summary.frames,
        skipped = summary.skipped,
        "Capture loop stopped ({:?})",
        summary.stopped_by
    );
}

/// Local display mode: runs on the calling thread until `q` is pressed.
pub fn run_window(capture: CaptureConfig, display: DisplayConfig) -> Result<()> {
    let shutdown = shutdown_flag();
    let pipeline_span = tracing::info_span!(
        "gesture.window",
        camera = %capture.camera_uri,
        model = %capture.model_path.display(),
        mirror = capture.mirror
    );
    let _pipeline_guard = pipeline_span.enter();

    let (mut camera, mut detector) = open_pipeline(&capture)?;
    let mut sink = DisplaySink::new(&display)?;
    info!("Running hand tracking, press q in the preview window to quit");

    let summary = run_acquisition(
        &mut camera,
        &mut detector,
        &mut sink,
        &ProcessOptions::from(&capture),
        &shutdown,
    );
    camera.release();
    log_summary(&summary?);
    Ok(())
}

/// Served mode: publishes to the HTTP surface, optionally mirrored to a local
/// window. Runs until Ctrl+C or until the camera closes.
pub fn run_serve(
    capture: CaptureConfig,
    stream: StreamConfig,
    preview: Option<DisplayConfig>,
) -> Result<()> {
    let shutdown = shutdown_flag();
    let pipeline_span = tracing::info_span!(
        "gesture.serve",
        camera = %capture.camera_uri,
        model = %capture.model_path.display(),
        mirror = capture.mirror,
        addr = %format_args!("{}:{}", stream.host, stream.port)
    );
    let _pipeline_guard = pipeline_span.enter();

    telemetry::init_metrics_recorder();
    let (mut camera, mut detector) = open_pipeline(&capture)?;
    let shared = SharedState::new_handle();
    let server =
        spawn_gesture_server(shared.clone(), &stream).context("Failed to start gesture server")?;

    let options = ProcessOptions::from(&capture);
    let publish = PublishSink::new(shared, &stream);
    let summary = match preview {
        Some(display) => match DisplaySink::new(&display) {
            Ok(window) => {
                let mut sink = (publish, window);
                run_acquisition(&mut camera, &mut detector, &mut sink, &options, &shutdown)
            }
            Err(err) => Err(err),
        },
        None => {
            let mut sink = publish;
            run_acquisition(&mut camera, &mut detector, &mut sink, &options, &shutdown)
        }
    };

    camera.release();
    server.stop();
    log_summary(&summary?);
    Ok(())
}
