//! Conversion between raw uploads and inline (base64) images.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;
use thiserror::Error;

use crate::models::InlineImage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty upload")]
    Empty,
    #[error("declared content type {0} is not an image")]
    NotAnImage(String),
    #[error("unrecognised image data")]
    Unrecognised,
    #[error("malformed data URI")]
    MalformedUri,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("image transcoding failed: {0}")]
    Transcode(String),
}

/// Encode an upload into an inline image.
///
/// The declared content type, when given, must be `image/*`. The bytes themselves are
/// sniffed and the detected format wins over the declared one.
pub fn encode(bytes: &[u8], declared: Option<&str>) -> Result<InlineImage, CodecError> {
    if let Some(ct) = declared {
        let ct = ct.trim();
        if !ct.is_empty() && !ct.to_ascii_lowercase().starts_with("image/") {
            return Err(CodecError::NotAnImage(ct.to_string()));
        }
    }
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    let format = image::guess_format(bytes).map_err(|_| CodecError::Unrecognised)?;
    Ok(InlineImage {
        mime_type: format.to_mime_type().to_string(),
        data: STANDARD.encode(bytes),
    })
}

/// Parse a `data:<mime>;base64,<payload>` URI.
pub fn parse_data_uri(uri: &str) -> Result<InlineImage, CodecError> {
    let rest = uri.strip_prefix("data:").ok_or(CodecError::MalformedUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(CodecError::MalformedUri)?;
    let mime = meta.strip_suffix(";base64").ok_or(CodecError::MalformedUri)?;
    if !mime.starts_with("image/") {
        return Err(CodecError::NotAnImage(mime.to_string()));
    }
    Ok(InlineImage { mime_type: mime.to_string(), data: payload.to_string() })
}

/// Accept either raw image bytes or a `data:` URI carrying one.
pub fn read_upload(body: &[u8], declared: Option<&str>) -> Result<InlineImage, CodecError> {
    if body.starts_with(b"data:") {
        let uri = std::str::from_utf8(body).map_err(|_| CodecError::MalformedUri)?;
        let inline = parse_data_uri(uri.trim())?;
        let raw = decode(&inline)?;
        return encode(&raw, Some(&inline.mime_type));
    }
    encode(body, declared)
}

/// Check that an inline image decodes to recognisable image bytes, returning it with
/// the sniffed MIME type.
pub fn verify(image: &InlineImage) -> Result<InlineImage, CodecError> {
    let bytes = decode(image)?;
    let format = image::guess_format(&bytes).map_err(|_| CodecError::Unrecognised)?;
    Ok(InlineImage { mime_type: format.to_mime_type().to_string(), data: image.data.clone() })
}

pub fn decode(image: &InlineImage) -> Result<Vec<u8>, CodecError> {
    STANDARD.decode(image.data.as_bytes()).map_err(|e| CodecError::Base64(e.to_string()))
}

/// Raw PNG bytes for an inline image, transcoding when it is stored in another format.
pub fn to_png(image: &InlineImage) -> Result<Vec<u8>, CodecError> {
    let bytes = decode(image)?;
    if matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
        return Ok(bytes);
    }
    let decoded = image::load_from_memory(&bytes).map_err(|e| CodecError::Transcode(e.to_string()))?;
    let mut out = std::io::Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CodecError::Transcode(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 10, 200]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn encodes_png_with_sniffed_mime() {
        let img = encode(&png_bytes(), Some("image/jpeg")).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert!(img.to_data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn rejects_non_image_content_type() {
        let err = encode(&png_bytes(), Some("text/plain")).unwrap_err();
        assert_eq!(err, CodecError::NotAnImage("text/plain".into()));
    }

    #[test]
    fn rejects_unrecognised_bytes() {
        assert_eq!(encode(b"hello world", None).unwrap_err(), CodecError::Unrecognised);
        assert_eq!(encode(b"", Some("image/png")).unwrap_err(), CodecError::Empty);
    }

    #[test]
    fn parses_data_uri() {
        let img = parse_data_uri("data:image/jpeg;base64,/9j/AAAA").unwrap();
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.data, "/9j/AAAA");
        assert_eq!(parse_data_uri("image/jpeg;base64,xx").unwrap_err(), CodecError::MalformedUri);
        assert!(matches!(parse_data_uri("data:text/plain;base64,xx"), Err(CodecError::NotAnImage(_))));
    }

    #[test]
    fn upload_accepts_data_uri_bodies() {
        let uri = encode(&png_bytes(), None).unwrap().to_data_uri();
        let img = read_upload(uri.as_bytes(), Some("text/plain")).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(decode(&img).unwrap(), png_bytes());

        let bogus = format!("data:image/png;base64,{}", STANDARD.encode(b"not an image"));
        assert_eq!(read_upload(bogus.as_bytes(), None).unwrap_err(), CodecError::Unrecognised);
        assert!(matches!(read_upload(b"data:image/png;base64,!!!", None), Err(CodecError::Base64(_))));
    }

    #[test]
    fn verify_rejects_bad_payloads() {
        let good = encode(&png_bytes(), None).unwrap();
        let labelled_wrong = InlineImage { mime_type: "image/webp".into(), data: good.data.clone() };
        assert_eq!(verify(&labelled_wrong).unwrap(), good);

        let not_b64 = InlineImage { mime_type: "image/png".into(), data: "é".repeat(40) };
        assert!(matches!(verify(&not_b64), Err(CodecError::Base64(_))));

        let not_image = InlineImage { mime_type: "image/png".into(), data: STANDARD.encode(b"plain text") };
        assert_eq!(verify(&not_image).unwrap_err(), CodecError::Unrecognised);
    }

    #[test]
    fn png_passes_through_and_jpeg_is_transcoded() {
        let png = png_bytes();
        let inline = encode(&png, None).unwrap();
        assert_eq!(to_png(&inline).unwrap(), png);

        let jpeg = encode(&jpeg_bytes(), None).unwrap();
        assert_eq!(jpeg.mime_type, "image/jpeg");
        let converted = to_png(&jpeg).unwrap();
        assert!(matches!(image::guess_format(&converted), Ok(ImageFormat::Png)));
    }
}
