use image::{DynamicImage, ImageFormat, ImageReader};
use serde::{Serialize, Serializer};
use std::io::Cursor;

use crate::errors::{AppError, AppResult};

/// Dimensions and container format of an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    #[serde(serialize_with = "serialize_format")]
    pub format: ImageFormat,
}

// Serialized as the MIME type, e.g. "image/jpeg"
fn serialize_format<S: Serializer>(format: &ImageFormat, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(format.to_mime_type())
}

/// Read dimensions and format from the header only
pub fn image_info(bytes: &[u8]) -> AppResult<ImageInfo> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(AppError::Io)?;

    let format = reader
        .format()
        .ok_or_else(|| AppError::Decode(unrecognized_format()))?;

    let (width, height) = reader.into_dimensions().map_err(AppError::Decode)?;

    Ok(ImageInfo {
        width,
        height,
        format,
    })
}

/// Decode `bytes` in whatever format they are in, turn the picture a quarter
/// turn clockwise and return it as PNG.
pub fn rotate_clockwise(bytes: &[u8]) -> AppResult<Vec<u8>> {
    let img = decode(bytes)?;

    log::debug!(
        "Decoded {}x{} image ({:?})",
        img.width(),
        img.height(),
        img.color()
    );

    let rotated = img.rotate90();
    encode_png(&rotated)
}

pub fn decode(bytes: &[u8]) -> AppResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(AppError::Decode)
}

/// Lossless PNG encoding
pub fn encode_png(img: &DynamicImage) -> AppResult<Vec<u8>> {
    // PNG has no float samples
    let converted;
    let img = match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            converted = DynamicImage::ImageRgba16(img.to_rgba16());
            &converted
        }
        other => other,
    };

    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(AppError::Encode)?;

    Ok(output)
}

fn unrecognized_format() -> image::ImageError {
    image::ImageError::Unsupported(image::error::UnsupportedError::from_format_and_kind(
        image::error::ImageFormatHint::Unknown,
        image::error::UnsupportedErrorKind::Format(image::error::ImageFormatHint::Unknown),
    ))
}
