use crate::domain::model::MimeType;
use crate::utils::error::{Result, ShError};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Decoded image as raw RGBA pixels plus the format it came in.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageProperties {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: MimeType,
}

fn mime_type_of(format: ImageFormat) -> Result<MimeType> {
    match format {
        ImageFormat::Png => Ok(MimeType::Png),
        ImageFormat::Jpeg => Ok(MimeType::Jpeg),
        other => Err(ShError::processing(format!(
            "Unsupported image format for post-processing: {:?}",
            other
        ))),
    }
}

pub fn get_image_properties(image_bytes: &[u8]) -> Result<ImageProperties> {
    let format = mime_type_of(image::guess_format(image_bytes)?)?;
    let decoded = image::load_from_memory(image_bytes)?.to_rgba8();

    Ok(ImageProperties {
        width: decoded.width(),
        height: decoded.height(),
        rgba: decoded.into_raw(),
        format,
    })
}

pub fn get_blob(properties: &ImageProperties) -> Result<Vec<u8>> {
    let buffer = RgbaImage::from_raw(properties.width, properties.height, properties.rgba.clone())
        .ok_or_else(|| {
            ShError::processing(format!(
                "RGBA buffer of {} bytes does not fit a {}x{} image",
                properties.rgba.len(),
                properties.width,
                properties.height
            ))
        })?;
    encode(DynamicImage::ImageRgba8(buffer), properties.format)
}

fn encode(image: DynamicImage, format: MimeType) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        MimeType::Png => image.write_to(&mut out, ImageFormat::Png)?,
        // JPEG has no alpha channel
        MimeType::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut out, ImageFormat::Jpeg)?,
        other => {
            return Err(ShError::processing(format!(
                "Cannot encode images as {}",
                other.as_str()
            )))
        }
    }
    Ok(out.into_inner())
}

/// Draws the images on a transparent `width` x `height` canvas in order, each
/// one stretched to the canvas and alpha-blended over what is already there.
pub fn compose_images(images: &[Vec<u8>], width: u32, height: u32, format: MimeType) -> Result<Vec<u8>> {
    let mut canvas = RgbaImage::new(width, height);

    for bytes in images {
        let layer = image::load_from_memory(bytes)?.to_rgba8();
        let layer = if layer.dimensions() == (width, height) {
            layer
        } else {
            imageops::resize(&layer, width, height, FilterType::Triangle)
        };
        imageops::overlay(&mut canvas, &layer, 0, 0);
    }

    encode(DynamicImage::ImageRgba8(canvas), format)
}
