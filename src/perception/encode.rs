use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::errors::{PilotError, PilotResult};
use crate::llm::types::EncodedImage;
use crate::perception::types::JpegSettings;

const MIN_QUALITY: f32 = 10.0;
const QUALITY_STEP: f32 = 0.9;

/// JPEG-encode `img`, lowering quality by 10% per attempt until the payload
/// fits `settings.max_bytes`.
pub fn encode_bounded_jpeg(img: &DynamicImage, settings: JpegSettings) -> PilotResult<EncodedImage> {
    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let mut quality = settings.quality.clamp(1, 100) as f32;

    loop {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.round() as u8);
        rgb.write_with_encoder(encoder)?;

        if buf.len() <= settings.max_bytes {
            tracing::debug!(
                bytes = buf.len(),
                quality = quality.round() as u8,
                width = rgb.width(),
                height = rgb.height(),
                "screenshot encoded"
            );
            return Ok(EncodedImage::jpeg(buf));
        }

        quality *= QUALITY_STEP;
        if quality < MIN_QUALITY {
            return Err(PilotError::Capture(format!(
                "cannot fit {}x{} screenshot into {} bytes",
                rgb.width(),
                rgb.height(),
                settings.max_bytes
            )));
        }
        tracing::debug!(bytes = buf.len(), next_quality = quality.round() as u8, "screenshot too large, degrading");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn noisy(w: u32, h: u32) -> DynamicImage {
        let mut img = RgbaImage::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)).wrapping_mul(2654435761) >> 24;
            *p = Rgba([v as u8, (v >> 1) as u8, (255 - v) as u8, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn small_image_encodes_as_jpeg() {
        let out = encode_bounded_jpeg(&noisy(64, 48), JpegSettings::default()).unwrap();
        assert_eq!(out.media_type, "image/jpeg");
        // SOI marker
        assert_eq!(&out.data[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn degrades_quality_to_fit_the_budget() {
        let img = noisy(256, 256);
        let full = encode_bounded_jpeg(&img, JpegSettings { quality: 95, max_bytes: usize::MAX }).unwrap();
        let budget = full.len() / 2;
        let bounded = encode_bounded_jpeg(&img, JpegSettings { quality: 95, max_bytes: budget }).unwrap();
        assert!(bounded.len() <= budget);
    }

    #[test]
    fn impossible_budget_is_a_capture_error() {
        let err = encode_bounded_jpeg(&noisy(128, 128), JpegSettings { quality: 85, max_bytes: 16 }).unwrap_err();
        assert!(matches!(err, PilotError::Capture(_)));
    }
}
