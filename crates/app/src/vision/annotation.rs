//! CPU drawing for hand skeleton overlays.

use anyhow::{Result, anyhow, bail};
use image::{Rgb, RgbImage, imageops};
use ml_core::HandLandmarks;
use video_ingest::{Frame, FrameFormat};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkStyle {
    pub line_color: Rgb<u8>,
    pub line_thickness: u32,
    pub point_color: Rgb<u8>,
    pub point_radius: u32,
}

impl Default for LandmarkStyle {
    fn default() -> Self {
        Self {
            line_color: Rgb([0, 255, 0]),
            line_thickness: 2,
            point_color: Rgb([0, 0, 255]),
            point_radius: 4,
        }
    }
}

/// Convert a captured BGR frame into an RGB image, optionally mirrored.
pub(crate) fn frame_to_rgb(frame: &Frame, mirror: bool) -> Result<RgbImage> {
    if !matches!(frame.format, FrameFormat::Bgr8) {
        bail!("unsupported frame format {:?}", frame.format);
    }
    if frame.width <= 0 || frame.height <= 0 {
        bail!("frame has no pixels ({}x{})", frame.width, frame.height);
    }
    let width = frame.width as u32;
    let height = frame.height as u32;
    let mut image = RgbImage::from_vec(width, height, bgr_to_rgb(&frame.data))
        .ok_or_else(|| anyhow!("failed to convert frame into image buffer"))?;
    if mirror {
        imageops::flip_horizontal_in_place(&mut image);
    }
    Ok(image)
}

fn bgr_to_rgb(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks_exact(3) {
        output.push(chunk[2]);
        output.push(chunk[1]);
        output.push(chunk[0]);
    }
    output
}

/// Draw the skeleton first, then the keypoints on top.
pub(crate) fn draw_hand(image: &mut RgbImage, hand: &HandLandmarks, style: &LandmarkStyle) {
    let (width, height) = image.dimensions();
    let line_radius = (style.line_thickness / 2) as i32;
    for (start, end) in hand.connections() {
        let (x0, y0) = start.to_pixel(width, height);
        let (x1, y1) = end.to_pixel(width, height);
        draw_line(image, (x0, y0), (x1, y1), line_radius, style.line_color);
    }
    for point in hand.points.iter() {
        let (cx, cy) = point.to_pixel(width, height);
        fill_circle(image, cx, cy, style.point_radius as i32, style.point_color);
    }
}

/// Bresenham line stamped with a disc of `radius` at every step.
fn draw_line(
    image: &mut RgbImage,
    (mut x0, mut y0): (i32, i32),
    (x1, y1): (i32, i32),
    radius: i32,
    color: Rgb<u8>,
) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if radius <= 0 {
            put_pixel(image, x0, y0, color);
        } else {
            fill_circle(image, x0, y0, radius, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_circle(image: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                put_pixel(image, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}
