//! Decoding of session frames (base64 JPEG) into frame buffers.

use anyhow::Context;
use base64::Engine as _;

use crate::foundation::core::FrameRgba;
use crate::foundation::error::{SaviError, SaviResult};

/// Decode one base64-encoded frame image as delivered by `create_session`.
pub fn decode_base64_jpeg(encoded: &str) -> SaviResult<FrameRgba> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| SaviError::protocol(format!("frame base64: {e}")))?;
    decode_frame(&bytes)
}

/// Decode an in-memory image (JPEG in practice, any `image`-supported
/// format) into a straight-alpha RGBA8 frame buffer.
pub fn decode_frame(bytes: &[u8]) -> SaviResult<FrameRgba> {
    let dyn_img = image::load_from_memory(bytes).context("decode frame image")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    FrameRgba::new(width, height, rgba.into_raw())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for p in img.pixels_mut() {
            *p = image::Rgba(px);
        }
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_frame_dimensions_and_pixels() {
        let bytes = png_bytes(2, 3, [10, 20, 30, 255]);
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!((frame.width, frame.height), (2, 3));
        assert_eq!(frame.pixel(1, 2).unwrap(), [10, 20, 30, 255]);
    }

    #[test]
    fn decode_base64_roundtrip() {
        let bytes = png_bytes(1, 1, [1, 2, 3, 255]);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let frame = decode_base64_jpeg(&encoded).unwrap();
        assert_eq!(frame.pixel(0, 0).unwrap(), [1, 2, 3, 255]);
    }

    #[test]
    fn garbage_base64_is_a_protocol_error() {
        assert!(matches!(
            decode_base64_jpeg("not-base64!!!"),
            Err(SaviError::Protocol(_))
        ));
    }

    #[test]
    fn garbage_image_bytes_error() {
        assert!(decode_frame(b"definitely not an image").is_err());
    }
}
