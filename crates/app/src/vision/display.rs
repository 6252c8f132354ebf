//! Local preview window with the gesture emoji overlay.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use ml_core::Gesture;
use opencv::{
    core::{CV_8UC3, Mat, Point, Ptr, Scalar},
    freetype::{self, FreeType2},
    highgui, imgproc,
    prelude::*,
};
use tracing::{debug, warn};

use crate::vision::{
    config::DisplayConfig,
    sink::{FrameSink, SinkControl},
};

const OVERLAY_ORIGIN: (i32, i32) = (30, 30);
const OVERLAY_HEIGHT: i32 = 120;
const QUIT_KEY: i32 = b'q' as i32;

const FONT_DIRS: &[&str] = &[
    "C:\\Windows\\Fonts",
    "/usr/share/fonts/truetype/noto",
    "/usr/share/fonts/noto",
    "/usr/share/fonts/truetype",
    "/System/Library/Fonts",
    "/Library/Fonts",
];

enum GlyphRenderer {
    FreeType(Ptr<FreeType2>),
    Hershey,
}

/// Emoji overlay that degrades to an ASCII face when the font is missing.
struct EmojiOverlay {
    renderer: GlyphRenderer,
}

impl EmojiOverlay {
    fn load(font: &Path) -> Self {
        let loaded = resolve_font(font)
            .with_context(|| format!("font {} not found", font.display()))
            .and_then(|path| load_freetype(&path));
        match loaded {
            Ok(ft) => {
                debug!(font = %font.display(), "emoji font loaded");
                Self {
                    renderer: GlyphRenderer::FreeType(ft),
                }
            }
            Err(err) => {
                warn!("emoji font unavailable ({err:#}); using built-in font");
                Self {
                    renderer: GlyphRenderer::Hershey,
                }
            }
        }
    }

    fn draw(&mut self, mat: &mut Mat, gesture: Gesture) -> opencv::Result<()> {
        let origin = Point::new(OVERLAY_ORIGIN.0, OVERLAY_ORIGIN.1 + OVERLAY_HEIGHT);
        let color = Scalar::new(0.0, 215.0, 255.0, 0.0);
        match &mut self.renderer {
            GlyphRenderer::FreeType(ft) => ft.put_text(
                mat,
                gesture.emoji(),
                origin,
                OVERLAY_HEIGHT,
                color,
                -1,
                imgproc::LINE_AA,
                true,
            ),
            GlyphRenderer::Hershey => imgproc::put_text(
                mat,
                gesture.ascii_face(),
                origin,
                imgproc::FONT_HERSHEY_SIMPLEX,
                4.0,
                color,
                8,
                imgproc::LINE_AA,
                false,
            ),
        }
    }
}

/// Look the font up as given, then by file name in the usual font folders.
fn resolve_font(font: &Path) -> Option<PathBuf> {
    if font.is_file() {
        return Some(font.to_path_buf());
    }
    let name = font.file_name()?;
    FONT_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| candidate.is_file())
}

fn load_freetype(path: &Path) -> Result<Ptr<FreeType2>> {
    let mut ft = freetype::create_free_type_2().context("FreeType support unavailable")?;
    ft.load_font_data(&path.to_string_lossy(), 0)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(ft)
}

/// OpenCV highgui window. Must live on the thread that created it.
pub(crate) struct DisplaySink {
    title: String,
    overlay: EmojiOverlay,
    mat: Mat,
    bgr: Vec<u8>,
}

impl DisplaySink {
    pub(crate) fn new(config: &DisplayConfig) -> Result<Self> {
        highgui::named_window(&config.window_title, highgui::WINDOW_AUTOSIZE)
            .context("Failed to open preview window")?;
        Ok(Self {
            title: config.window_title.clone(),
            overlay: EmojiOverlay::load(&config.emoji_font),
            mat: Mat::default(),
            bgr: Vec::new(),
        })
    }

    fn upload(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = (frame.width() as i32, frame.height() as i32);
        if self.mat.rows() != height || self.mat.cols() != width {
            self.mat =
                Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?;
        }
        self.bgr.clear();
        for pixel in frame.pixels() {
            let [r, g, b] = pixel.0;
            self.bgr.extend_from_slice(&[b, g, r]);
        }
        self.mat.data_bytes_mut()?.copy_from_slice(&self.bgr);
        Ok(())
    }
}

impl FrameSink for DisplaySink {
    fn consume(&mut self, frame: &RgbImage, gesture: Option<Gesture>) -> Result<SinkControl> {
        self.upload(frame)?;
        if let Some(gesture) = gesture {
            if let Err(err) = self.overlay.draw(&mut self.mat, gesture) {
                debug!("emoji overlay failed: {err}");
            }
        }
        highgui::imshow(&self.title, &self.mat)?;
        let key = highgui::wait_key(1)?;
        if key >= 0 && key & 0xFF == QUIT_KEY {
            debug!("quit key pressed");
            return Ok(SinkControl::Stop);
        }
        Ok(SinkControl::Continue)
    }
}

impl Drop for DisplaySink {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.title);
    }
}
