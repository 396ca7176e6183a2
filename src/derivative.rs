//! Image style derivatives
//!
//! A derivative is the source image run through the effects of an image
//! style, stored under `public://styles/{style}/{scheme}/{path}`. Derivatives
//! are created the first time they are needed and trusted afterwards; the
//! dimensions are always measured from the file on disk.
//!
//! Generation writes to a temporary file next to the target and renames it
//! into place, so readers never see a partial image. Two requests racing on
//! the same first generation both write; the last rename wins and both
//! produce the same bytes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::files::{PublicFiles, PUBLIC_SCHEME};
use crate::models::{Derivative, ImageEffect, ImageStyle, ResponsiveImageStyle};

/// Query parameter carrying the derivative token.
pub const TOKEN_QUERY: &str = "itok";

const TOKEN_LENGTH: usize = 8;

/// Default JPEG quality, as used by most image toolkits.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Error generating or measuring a derivative
#[derive(Debug, Error)]
pub enum DerivativeError {
    #[error("Source image '{0}' is missing")]
    SourceMissing(String),
    #[error("Unsupported stream wrapper for '{0}'")]
    UnsupportedScheme(String),
    #[error("Responsive image style '{responsive}' does not fall back to '{fallback}'")]
    InvalidStyle { responsive: String, fallback: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Creates and measures image style derivatives.
#[derive(Debug, Clone)]
pub struct DerivativeGenerator {
    files: PublicFiles,
    private_key: String,
    jpeg_quality: u8,
}

impl DerivativeGenerator {
    pub fn new(files: PublicFiles, private_key: impl Into<String>) -> Self {
        Self { files, private_key: private_key.into(), jpeg_quality: DEFAULT_JPEG_QUALITY }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn files(&self) -> &PublicFiles {
        &self.files
    }

    /// URI the derivative of `source_uri` is stored at.
    pub fn build_uri(&self, style_id: &str, source_uri: &str) -> String {
        let (scheme, path) = match source_uri.split_once("://") {
            Some((scheme, path)) => (scheme, path.trim_start_matches('/')),
            None => (PUBLIC_SCHEME, source_uri.trim_start_matches('/')),
        };
        format!("{}://styles/{}/{}/{}", PUBLIC_SCHEME, style_id, scheme, path)
    }

    /// Token protecting derivative URLs against arbitrary generation requests.
    pub fn token(&self, style_id: &str, source_uri: &str) -> String {
        let digest =
            Sha256::digest(format!("{}:{}:{}", style_id, source_uri, self.private_key).as_bytes());
        let mut token = URL_SAFE_NO_PAD.encode(digest);
        token.truncate(TOKEN_LENGTH);
        token
    }

    /// Public URL of the derivative, including its token.
    pub fn build_url(&self, style_id: &str, source_uri: &str) -> Option<String> {
        let mut url = self.files.create_url(&self.build_uri(style_id, source_uri))?;
        url.query_pairs_mut().append_pair(TOKEN_QUERY, &self.token(style_id, source_uri));
        Some(url.into())
    }

    /// Make sure the derivative exists and return it with its real dimensions.
    #[instrument(skip(self, style), fields(style = %style.id))]
    pub fn ensure(&self, style: &ImageStyle, source_uri: &str) -> Result<Derivative, DerivativeError> {
        let derived_uri = self.build_uri(&style.id, source_uri);
        let derived_path = self
            .files
            .realpath(&derived_uri)
            .ok_or_else(|| DerivativeError::UnsupportedScheme(derived_uri.clone()))?;

        if derived_path.exists() {
            debug!(uri = %derived_uri, "derivative exists");
        } else {
            let source_path = self
                .files
                .realpath(source_uri)
                .ok_or_else(|| DerivativeError::UnsupportedScheme(source_uri.to_string()))?;
            if !source_path.is_file() {
                return Err(DerivativeError::SourceMissing(source_uri.to_string()));
            }
            self.generate(style, &source_path, &derived_path)?;
            info!(uri = %derived_uri, "generated derivative");
        }

        let (width, height) = image::image_dimensions(&derived_path)?;
        let url = self
            .build_url(&style.id, source_uri)
            .ok_or_else(|| DerivativeError::UnsupportedScheme(derived_uri.clone()))?;

        Ok(Derivative {
            style_id: style.id.clone(),
            source_uri: source_uri.to_string(),
            derived_uri,
            url,
            width,
            height,
        })
    }

    /// Derivative of the responsive style's fallback image style.
    pub fn ensure_responsive(
        &self,
        responsive: &ResponsiveImageStyle,
        fallback: &ImageStyle,
        source_uri: &str,
    ) -> Result<Derivative, DerivativeError> {
        if responsive.fallback_image_style != fallback.id {
            return Err(DerivativeError::InvalidStyle {
                responsive: responsive.id.clone(),
                fallback: fallback.id.clone(),
            });
        }
        self.ensure(fallback, source_uri)
    }

    fn generate(
        &self,
        style: &ImageStyle,
        source: &Path,
        target: &Path,
    ) -> Result<(), DerivativeError> {
        let image = apply_effects(image::open(source)?, &style.effects);

        let parent = target.parent().unwrap_or(Path::new(""));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }

        let format = ImageFormat::from_path(target).unwrap_or(ImageFormat::Png);
        let file_name = target.file_name().and_then(|n| n.to_str()).unwrap_or("derivative");
        let temp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = self
            .write_image(&image, &temp, format)
            .and_then(|()| fs::rename(&temp, target).map_err(DerivativeError::from));
        if written.is_err() {
            let _ = fs::remove_file(&temp);
        }
        written
    }

    fn write_image(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: ImageFormat,
    ) -> Result<(), DerivativeError> {
        if format == ImageFormat::Jpeg {
            let rgb = image.to_rgb8();
            let mut writer = BufWriter::new(File::create(path)?);
            JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality).encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ColorType::Rgb8,
            )?;
            writer.flush()?;
        } else {
            image.save_with_format(path, format)?;
        }
        Ok(())
    }
}

fn apply_effects(mut image: DynamicImage, effects: &[ImageEffect]) -> DynamicImage {
    for effect in effects {
        image = match *effect {
            ImageEffect::Scale { width, height, upscale } => {
                match scale_dimensions(image.dimensions(), width, height, upscale) {
                    Some((w, h)) => image.resize_exact(w, h, FilterType::Triangle),
                    None => image,
                }
            }
            ImageEffect::Resize { width, height } => {
                image.resize_exact(width, height, FilterType::Triangle)
            }
            ImageEffect::ScaleAndCrop { width, height } => {
                image.resize_to_fill(width, height, FilterType::Triangle)
            }
        };
    }
    image
}

/// Dimensions a style produces for a `width`×`height` source, without I/O.
pub fn transform_dimensions(style: &ImageStyle, width: u32, height: u32) -> (u32, u32) {
    style.effects.iter().fold((width, height), |dims, effect| match *effect {
        ImageEffect::Scale { width, height, upscale } => {
            scale_dimensions(dims, width, height, upscale).unwrap_or(dims)
        }
        ImageEffect::Resize { width, height } | ImageEffect::ScaleAndCrop { width, height } => {
            (width, height)
        }
    })
}

/// Fit `(width, height)` inside the target box keeping the aspect ratio.
///
/// Returns `None` when the image stays as it is: no target given, a zero
/// source dimension, or a scale factor of at least 1 while upscaling is off.
fn scale_dimensions(
    (orig_w, orig_h): (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    upscale: bool,
) -> Option<(u32, u32)> {
    let width = width.filter(|w| *w > 0);
    let height = height.filter(|h| *h > 0);
    if orig_w == 0 || orig_h == 0 || (width.is_none() && height.is_none()) {
        return None;
    }
    let (ow, oh) = (u64::from(orig_w), u64::from(orig_h));

    // The side that fixes the scale factor decides whether this is an upscale.
    let (w, h, upscaling) = match (width, height) {
        (Some(w), None) => (u64::from(w), round_div(u64::from(w) * oh, ow), u64::from(w) >= ow),
        (Some(w), Some(h)) if oh * u64::from(w) < u64::from(h) * ow => {
            (u64::from(w), round_div(u64::from(w) * oh, ow), u64::from(w) >= ow)
        }
        (_, Some(h)) => (round_div(u64::from(h) * ow, oh), u64::from(h), u64::from(h) >= oh),
        (None, None) => return None,
    };

    if !upscale && upscaling {
        return None;
    }
    Some((u32::try_from(w.max(1)).ok()?, u32::try_from(h.max(1)).ok()?))
}

/// `num / den` rounded half away from zero.
fn round_div(num: u64, den: u64) -> u64 {
    (num * 2 + den) / (den * 2)
}
