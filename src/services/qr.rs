//! QR pass encoding and rendering

use base64::Engine;

use crate::{
    error::{AppError, AppResult},
    models::visitor::QrPayload,
};

/// Lower bound on the rendered pass edge length, in pixels
const QR_MIN_DIMENSION: u32 = 240;

/// Serialize the pass snapshot. Struct field order is the wire order, so the
/// same payload always produces the same string.
pub fn encode_payload(payload: &QrPayload) -> AppResult<String> {
    serde_json::to_string(payload)
        .map_err(|e| AppError::Internal(format!("Failed to serialize QR payload: {}", e)))
}

/// Render the payload string into a PNG at a fixed pixel size
pub fn render_png(payload_json: &str) -> AppResult<Vec<u8>> {
    let code = qrcode::QrCode::new(payload_json.as_bytes())
        .map_err(|e| AppError::Internal(format!("Failed to build QR code: {}", e)))?;

    let img = code
        .render::<image::Luma<u8>>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build();

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to encode QR image: {}", e)))?;

    Ok(png)
}

/// Embeddable reference for JSON responses
pub fn data_uri(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visitor::VisitStatus;
    use chrono::Utc;

    fn payload() -> QrPayload {
        QrPayload {
            id: "20260804101500-X3K9QA".to_string(),
            name: "Jane Doe".to_string(),
            mobile: None,
            host: None,
            purpose: "Meeting".to_string(),
            checkin: Utc::now(),
            status: VisitStatus::CheckedIn,
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let p = payload();
        assert_eq!(encode_payload(&p).unwrap(), encode_payload(&p).unwrap());
    }

    #[test]
    fn rendered_pass_is_a_png() {
        let json = encode_payload(&payload()).unwrap();
        let png = render_png(&json).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn data_uri_is_embeddable() {
        let uri = data_uri(b"fake");
        assert!(uri.starts_with("data:image/png;base64,"));
    }
}
