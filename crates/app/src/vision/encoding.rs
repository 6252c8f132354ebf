//! JPEG preview encoding for published frames.

use actix_web::web::Bytes;
use anyhow::{Result, anyhow};
use image::{RgbImage, codecs::jpeg::JpegEncoder, imageops};

/// Downscale `image` to `width`x`height` and encode it as JPEG.
pub(crate) fn encode_preview(
    image: &RgbImage,
    width: u32,
    height: u32,
    jpeg_quality: u8,
) -> Result<Bytes> {
    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
        &resized
    };

    let mut buffer = Vec::with_capacity((width * height / 4) as usize);
    let quality = jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(source)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, Rgb};

    use super::*;

    #[test]
    fn downscales_to_stream_size() {
        let image = RgbImage::from_pixel(640, 480, Rgb([200, 40, 40]));
        let jpeg = encode_preview(&image, 320, 240, 50).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (320, 240));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let mut image = RgbImage::new(320, 240);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8]);
        }
        let low = encode_preview(&image, 320, 240, 10).unwrap();
        let high = encode_preview(&image, 320, 240, 95).unwrap();
        assert!(low.len() < high.len());
    }
}
