use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, RgbImage};
use tracing::{debug, warn};

use crate::errors::PoetryError;

pub type SharedImage = Arc<RgbImage>;

const MIN_IMAGE_SIDE: u32 = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color: String,
    pub mime_type: Option<String>,
    pub size_kb: f64,
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Accepts 8-bit RGB, RGBA or greyscale images whose sides are at least 32px.
pub fn validate_image(image: &DynamicImage) -> bool {
    if image.width() < MIN_IMAGE_SIDE || image.height() < MIN_IMAGE_SIDE {
        return false;
    }
    matches!(
        image.color(),
        ColorType::Rgb8 | ColorType::Rgba8 | ColorType::L8
    )
}

pub fn preprocess_image(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

pub fn image_info(image: &DynamicImage, mime_type: Option<&str>) -> ImageInfo {
    ImageInfo {
        width: image.width(),
        height: image.height(),
        color: format!("{:?}", image.color()),
        mime_type: mime_type.map(str::to_string),
        size_kb: image.as_bytes().len() as f64 / 1024.0,
    }
}

/// Decodes uploaded bytes into the RGB bitmap the pipeline works on.
pub fn load_upload(bytes: &[u8]) -> Result<(SharedImage, ImageInfo), PoetryError> {
    if bytes.is_empty() {
        return Err(PoetryError::InvalidImage("upload is empty".to_string()));
    }

    let mime_type = detect_mime_type(bytes);
    match mime_type.as_deref() {
        Some(mime) if mime.starts_with("image/") => {}
        Some(mime) => {
            warn!("Rejected upload with non-image MIME type {}", mime);
            return Err(PoetryError::InvalidImage(format!(
                "unsupported content type {mime}"
            )));
        }
        None => {
            return Err(PoetryError::InvalidImage(
                "unrecognised content type".to_string(),
            ));
        }
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|err| PoetryError::InvalidImage(format!("decode failed: {err}")))?;
    let info = image_info(&decoded, mime_type.as_deref());
    if !validate_image(&decoded) {
        return Err(PoetryError::InvalidImage(format!(
            "{}x{} {} is not supported (need at least {MIN_IMAGE_SIDE}px per side in RGB, RGBA or L)",
            info.width, info.height, info.color
        )));
    }

    debug!(
        "Decoded upload: {}x{} {} {:?} {:.1}KiB",
        info.width, info.height, info.color, info.mime_type, info.size_kb
    );
    Ok((Arc::new(preprocess_image(decoded)), info))
}

/// JPEG-encodes the bitmap into an embeddable `data:` URI.
pub fn encode_data_uri(image: &RgbImage, quality: u8) -> Result<String, PoetryError> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .encode_image(image)
            .map_err(|err| PoetryError::InvalidImage(format!("encode failed: {err}")))?;
    }
    let encoded = general_purpose::STANDARD.encode(buffer.into_inner());
    Ok(format!("data:image/jpeg;base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb};

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn data_uri_round_trips_through_jpeg() {
        let image = RgbImage::from_pixel(40, 40, Rgb([120, 160, 90]));
        let uri = encode_data_uri(&image, 85).unwrap();
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(detect_mime_type(&bytes).as_deref(), Some("image/jpeg"));
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 40));
    }

    #[test]
    fn load_upload_converts_greyscale_to_rgb() {
        let grey = DynamicImage::ImageLuma8(GrayImage::from_pixel(48, 32, Luma([90])));
        let (image, info) = load_upload(&png_bytes(&grey)).unwrap();
        assert_eq!(image.dimensions(), (48, 32));
        assert_eq!(image.get_pixel(0, 0), &Rgb([90, 90, 90]));
        assert_eq!(info.mime_type.as_deref(), Some("image/png"));
        assert_eq!(info.color, "L8");
    }

    #[test]
    fn tiny_images_are_rejected() {
        let small = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 64, Rgb([1, 2, 3])));
        let err = load_upload(&png_bytes(&small)).unwrap_err();
        assert!(matches!(err, PoetryError::InvalidImage(_)));
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let err = load_upload(b"%PDF-1.7 not a picture at all").unwrap_err();
        assert!(matches!(err, PoetryError::InvalidImage(_)));
        assert!(matches!(
            load_upload(&[]).unwrap_err(),
            PoetryError::InvalidImage(_)
        ));
    }

    #[test]
    fn sixteen_bit_images_fail_validation() {
        let deep = DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(
            64,
            64,
            Rgb([1000u16, 2000, 3000]),
        ));
        assert!(!validate_image(&deep));
    }
}
