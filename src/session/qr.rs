//! Pairing code rendering
//!
//! Codes are rendered as a 256x256 greyscale PNG with medium error
//! correction and returned as a `data:` URI ready for an `<img>` tag.

use crate::error::{SessionError, SessionResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

/// Side length of the rendered QR image in pixels
pub const QR_SIZE: u32 = 256;

pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Render `code` as PNG bytes
pub fn render_png(code: &str) -> SessionResult<Vec<u8>> {
    let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::M)
        .map_err(|e| SessionError::QrRender(e.to_string()))?;

    let rendered = qr
        .render::<Luma<u8>>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();
    // Module sizes are integral, so snap to the exact output size
    let scaled = imageops::resize(&rendered, QR_SIZE, QR_SIZE, FilterType::Nearest);

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(scaled)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| SessionError::QrRender(e.to_string()))?;
    Ok(png)
}

/// Render `code` as a base64 PNG data URI
pub fn render_data_uri(code: &str) -> SessionResult<String> {
    let png = render_png(code)?;
    Ok(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_png_is_exact_size() {
        let png = render_png("2@ref,noise,identity,adv").unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (QR_SIZE, QR_SIZE));
    }

    #[test]
    fn test_data_uri_round_trips_to_png() {
        let uri = render_data_uri("2@ref,noise,identity,adv").unwrap();
        let payload = uri.strip_prefix(DATA_URI_PREFIX).unwrap();

        let png = STANDARD.decode(payload).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_oversized_code_is_render_error() {
        let code = "x".repeat(8000);
        assert!(matches!(
            render_data_uri(&code),
            Err(SessionError::QrRender(_))
        ));
    }
}
