use anyhow::{Result, anyhow};
use image::{DynamicImage, GenericImageView, ImageFormat, imageops::FilterType};

/// Input resolution of the try-on model.
pub const TRYON_WIDTH: u32 = 768;
pub const TRYON_HEIGHT: u32 = 1024;

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&PNG_MAGIC) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Result<ImageFormat> {
    match mime_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        "image/bmp" => Ok(ImageFormat::Bmp),
        _ => Err(anyhow!("unsupported mime type: {mime_type}")),
    }
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_MAGIC)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let mime_type = detect_mime_type(bytes).ok_or_else(|| anyhow!("unrecognized image data"))?;
    let format = mime_to_format(mime_type)?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|err| anyhow!("decode image failed: {err}"))
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|err| anyhow!("encode png failed: {err}"))?;
    Ok(output)
}

/// Re-encodes any supported image as a 3-channel PNG. Alpha is dropped since
/// the hosted models expect RGB input.
pub fn convert_to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let image = decode_image(bytes)?;
    encode_png(&DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Region of the person image that is sent to the model when auto-crop is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centered region with a 3:4 (width:height) aspect ratio, never
/// narrower or shorter than one pixel.
pub fn crop_box_3x4(width: u32, height: u32) -> CropBox {
    let target_width = ((width as f64).min(height as f64 * 3.0 / 4.0) as u32).clamp(1, width.max(1));
    let target_height = ((height as f64).min(width as f64 * 4.0 / 3.0) as u32).clamp(1, height.max(1));
    CropBox {
        left: width.saturating_sub(target_width) / 2,
        top: height.saturating_sub(target_height) / 2,
        width: target_width,
        height: target_height,
    }
}

pub fn center_crop_3x4(image: &DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    let region = crop_box_3x4(width, height);
    image.crop_imm(region.left, region.top, region.width, region.height)
}

/// Person image resized for the model, plus the crop applied to it.
#[derive(Debug, Clone)]
pub struct PreparedPerson {
    pub png: Vec<u8>,
    pub crop: Option<CropBox>,
}

pub fn prepare_person(png: &[u8], auto_crop: bool) -> Result<PreparedPerson> {
    let image = decode_image(png)?;
    let (image, crop) = if auto_crop {
        let (width, height) = image.dimensions();
        (center_crop_3x4(&image), Some(crop_box_3x4(width, height)))
    } else {
        (image, None)
    };
    Ok(PreparedPerson {
        png: encode_png(&image.resize_exact(TRYON_WIDTH, TRYON_HEIGHT, FilterType::Lanczos3))?,
        crop,
    })
}

/// Scales a model result back to `crop` and pastes it over the full-size
/// person image, so an auto-cropped try-on keeps the original framing.
pub fn paste_back(person: &[u8], result: &[u8], crop: CropBox) -> Result<Vec<u8>> {
    let mut canvas = decode_image(person)?.to_rgb8();
    let patch = decode_image(result)?
        .resize_exact(crop.width, crop.height, FilterType::Lanczos3)
        .to_rgb8();
    image::imageops::replace(&mut canvas, &patch, i64::from(crop.left), i64::from(crop.top));
    encode_png(&DynamicImage::ImageRgb8(canvas))
}

pub fn prepare_garment(png: &[u8]) -> Result<Vec<u8>> {
    let image = decode_image(png)?;
    encode_png(&image.resize_exact(TRYON_WIDTH, TRYON_HEIGHT, FilterType::Lanczos3))
}

/// Reads only the image header.
pub fn get_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}
