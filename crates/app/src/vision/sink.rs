//! Output side of the capture loop.

use anyhow::Result;
use image::RgbImage;
use ml_core::Gesture;

use crate::vision::{config::StreamConfig, data::SharedHandle, encoding::encode_preview};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SinkControl {
    Continue,
    Stop,
}

/// Receives every annotated frame together with its gesture.
pub(crate) trait FrameSink {
    fn consume(&mut self, frame: &RgbImage, gesture: Option<Gesture>) -> Result<SinkControl>;
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn consume(&mut self, frame: &RgbImage, gesture: Option<Gesture>) -> Result<SinkControl> {
        (**self).consume(frame, gesture)
    }
}

/// Feeds both sinks; stops as soon as either asks to.
impl<A: FrameSink, B: FrameSink> FrameSink for (A, B) {
    fn consume(&mut self, frame: &RgbImage, gesture: Option<Gesture>) -> Result<SinkControl> {
        let first = self.0.consume(frame, gesture)?;
        let second = self.1.consume(frame, gesture)?;
        if first == SinkControl::Stop || second == SinkControl::Stop {
            Ok(SinkControl::Stop)
        } else {
            Ok(SinkControl::Continue)
        }
    }
}

/// Overwrites the shared gesture and frame slots read by the HTTP handlers.
pub(crate) struct PublishSink {
    shared: SharedHandle,
    width: u32,
    height: u32,
    jpeg_quality: u8,
}

impl PublishSink {
    pub(crate) fn new(shared: SharedHandle, config: &StreamConfig) -> Self {
        Self {
            shared,
            width: config.width,
            height: config.height,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

impl FrameSink for PublishSink {
    fn consume(&mut self, frame: &RgbImage, gesture: Option<Gesture>) -> Result<SinkControl> {
        self.shared.publish_gesture(gesture);
        metrics::counter!(
            "gesture_published_total",
            "gesture" => gesture.map_or("none", Gesture::label)
        )
        .increment(1);

        let jpeg = tracing::info_span!("publish.encode", width = self.width, height = self.height)
            .in_scope(|| encode_preview(frame, self.width, self.height, self.jpeg_quality))?;
        self.shared.publish_frame(jpeg);
        Ok(SinkControl::Continue)
    }
}
