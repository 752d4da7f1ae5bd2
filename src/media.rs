//! Media preprocessing
//!
//! Turns raw image bytes into network-safe, size-bounded variants before
//! upload:
//!
//! - **Convert**: WebP sources are re-encoded as PNG when `convert_webp` is
//!   set (older clients cannot render WebP images).
//! - **Resize**: with `compress` set, the longer side is shrunk to at most
//!   [`MAX_IMAGE_SIDE`] pixels, keeping the aspect ratio and the current
//!   format.
//! - **Thumbnail**: always a JPEG exactly [`THUMBNAIL_WIDTH`] pixels wide.
//! - **Sticker**: exactly [`STICKER_SIDE`]² pixels, lossless WebP.
//!
//! Every transformation returns a new [`MediaAsset`]. A failure at any stage
//! returns a [`MediaError`] labelled with the stage and produces no output.

use crate::config::MediaConfig;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::io::Cursor;

pub const WEBP_MIME: &str = "image/webp";
pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";

/// Longest side of a compressed image
pub const MAX_IMAGE_SIDE: u32 = 1024;

/// Width of every image thumbnail
pub const THUMBNAIL_WIDTH: u32 = 72;

/// Tallest thumbnail produced; taller sources are center-cropped first
pub const MAX_THUMBNAIL_HEIGHT: u32 = 1024;

/// Width and height of every sticker
pub const STICKER_SIDE: u32 = 512;

/// Raw media bytes with their declared MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl MediaAsset {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }
}

/// Output of the image path: the image to upload and its thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub image: MediaAsset,
    pub thumbnail: MediaAsset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOp {
    Decode,
    Encode,
}

impl fmt::Display for MediaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaOp::Decode => f.write_str("decode"),
            MediaOp::Encode => f.write_str("encode"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStage {
    Convert,
    Resize,
    Thumbnail,
    Sticker,
}

impl fmt::Display for MediaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaStage::Convert => "convert",
            MediaStage::Resize => "resize",
            MediaStage::Thumbnail => "thumbnail",
            MediaStage::Sticker => "sticker",
        };
        f.write_str(name)
    }
}

/// A decode or encode failure at a named stage
#[derive(Debug, thiserror::Error)]
#[error("Failed to {op} image stream at {stage} stage: {source}")]
pub struct MediaError {
    pub op: MediaOp,
    pub stage: MediaStage,
    #[source]
    pub source: image::ImageError,
}

fn decode(bytes: &[u8], stage: MediaStage) -> Result<DynamicImage, MediaError> {
    image::load_from_memory(bytes).map_err(|source| MediaError {
        op: MediaOp::Decode,
        stage,
        source,
    })
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    stage: MediaStage,
) -> Result<Vec<u8>, MediaError> {
    // JPEG has no alpha channel and the WebP encoder only takes 8-bit RGB(A)
    let normalized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        ImageFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => img.clone(),
    };

    let mut out = Cursor::new(Vec::new());
    normalized
        .write_to(&mut out, format)
        .map_err(|source| MediaError {
            op: MediaOp::Encode,
            stage,
            source,
        })?;
    Ok(out.into_inner())
}

/// Height of a [`THUMBNAIL_WIDTH`]-wide image with the same aspect ratio,
/// capped at [`MAX_THUMBNAIL_HEIGHT`]
fn thumbnail_height(width: u32, height: u32) -> u32 {
    let width = u64::from(width.max(1));
    let scaled = (u64::from(height) * u64::from(THUMBNAIL_WIDTH) + width / 2) / width;
    scaled.clamp(1, u64::from(MAX_THUMBNAIL_HEIGHT)) as u32
}

/// Scale to [`THUMBNAIL_WIDTH`], center-cropping sources too tall for
/// [`MAX_THUMBNAIL_HEIGHT`] so the thumbnail keeps their aspect ratio
fn scale_thumbnail(img: &DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let thumb_height = thumbnail_height(width, height);

    let visible = u64::from(width) * u64::from(thumb_height) / u64::from(THUMBNAIL_WIDTH);
    let visible = visible.clamp(1, u64::from(height)) as u32;
    let source = if visible < height {
        img.crop_imm(0, (height - visible) / 2, width, visible)
    } else {
        img.clone()
    };

    source.resize_exact(THUMBNAIL_WIDTH, thumb_height, FilterType::Triangle)
}

/// Run the image path: optional conversion, optional compression, thumbnail.
pub fn prepare_image(
    asset: MediaAsset,
    config: &MediaConfig,
) -> Result<PreparedImage, MediaError> {
    let mut current = asset;
    let mut decoded: Option<DynamicImage> = None;

    if config.convert_webp && current.mime == WEBP_MIME {
        let img = decode(&current.bytes, MediaStage::Convert)?;
        let png = encode(&img, ImageFormat::Png, MediaStage::Convert)?;
        current = MediaAsset::new(png, PNG_MIME);
        decoded = Some(img);
    }

    if config.compress {
        let img = match decoded.take() {
            Some(img) => img,
            None => decode(&current.bytes, MediaStage::Resize)?,
        };

        if img.width().max(img.height()) > MAX_IMAGE_SIDE {
            let format = image::guess_format(&current.bytes).map_err(|source| MediaError {
                op: MediaOp::Decode,
                stage: MediaStage::Resize,
                source,
            })?;
            let resized = img.resize(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE, FilterType::Lanczos3);
            let bytes = encode(&resized, format, MediaStage::Resize)?;
            current = MediaAsset::new(bytes, current.mime);
            decoded = Some(resized);
        } else {
            decoded = Some(img);
        }
    }

    let img = match decoded {
        Some(img) => img,
        None => decode(&current.bytes, MediaStage::Thumbnail)?,
    };
    let thumbnail = encode(&scale_thumbnail(&img), ImageFormat::Jpeg, MediaStage::Thumbnail)?;

    Ok(PreparedImage {
        image: current,
        thumbnail: MediaAsset::new(thumbnail, JPEG_MIME),
    })
}

/// Run the sticker path: exact square resize, lossless WebP.
pub fn prepare_sticker(bytes: &[u8]) -> Result<MediaAsset, MediaError> {
    let img = decode(bytes, MediaStage::Sticker)?;
    let sticker = img.resize_exact(STICKER_SIDE, STICKER_SIDE, FilterType::Lanczos3);
    let webp = encode(&sticker, ImageFormat::WebP, MediaStage::Sticker)?;
    Ok(MediaAsset::new(webp, WEBP_MIME))
}
