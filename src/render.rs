//! Field markup rendering
//!
//! The engine never builds HTML itself. For payloads that embed markup
//! (videos and responsive images) it asks a [`Renderer`] to render the source
//! field of a resource in a display mode, and merges whatever the renderer
//! read into the result's cache metadata.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::cache::{CacheMetadata, Cacheable, MEDIA_TARGET_TYPE};
use crate::derivative::{transform_dimensions, DerivativeGenerator};
use crate::error::{ErrorKind, RESPONSIVE_STYLE_MISSING, SOURCE_FILE_MISSING, SOURCE_IMAGE_MISSING};
use crate::models::{Component, FileRecord, Resource, SourceValue};
use crate::repository::{DisplayRepository, FileRepository, StyleRepository};

/// Path of the iframe endpoint that proxies remote video embeds.
pub const MEDIA_OEMBED_PATH: &str = "media/oembed";

/// Markup plus the dependencies read while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub markup: String,
    pub cache: CacheMetadata,
}

/// Error rendering a field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
    kind: ErrorKind,
    message: String,
    cache: CacheMetadata,
}

impl RenderError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, message: kind.default_message().to_string(), cache: CacheMetadata::new() }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), cache: CacheMetadata::new() }
    }

    fn with_cache(mut self, cache: &CacheMetadata) -> Self {
        self.cache = self.cache.merge(cache);
        self
    }

    /// Classification the renderer reports.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Dependencies read before the failure.
    pub fn cache(&self) -> &CacheMetadata {
        &self.cache
    }
}

/// Renders one field of a resource in a display mode.
pub trait Renderer: Send + Sync {
    fn render(&self, resource: &Resource, field: &str, mode: &str) -> Result<Rendered, RenderError>;
}

/// Renders the components this crate knows about as plain HTML.
pub struct MarkupRenderer {
    displays: Arc<dyn DisplayRepository>,
    styles: Arc<dyn StyleRepository>,
    files: Arc<dyn FileRepository>,
    derivatives: DerivativeGenerator,
    site_url: Url,
    private_key: String,
}

impl MarkupRenderer {
    pub fn new(
        displays: Arc<dyn DisplayRepository>,
        styles: Arc<dyn StyleRepository>,
        files: Arc<dyn FileRepository>,
        derivatives: DerivativeGenerator,
        site_url: Url,
        private_key: impl Into<String>,
    ) -> Self {
        Self { displays, styles, files, derivatives, site_url, private_key: private_key.into() }
    }

    fn video(
        &self,
        resource: &Resource,
        max_width: u32,
        max_height: u32,
    ) -> Result<String, RenderError> {
        let source_url = resource
            .source
            .value
            .remote_url()
            .ok_or_else(|| RenderError::new(ErrorKind::MissingAsset))?;

        let width = non_zero(max_width).or(resource.metadata.width);
        let height = non_zero(max_height).or(resource.metadata.height);

        let mut src = self
            .site_url
            .join(MEDIA_OEMBED_PATH)
            .map_err(|e| RenderError::with_message(ErrorKind::MissingAsset, e.to_string()))?;
        src.query_pairs_mut()
            .append_pair("url", source_url)
            .append_pair("max_width", &max_width.to_string())
            .append_pair("max_height", &max_height.to_string())
            .append_pair("hash", &self.iframe_hash(source_url, max_width, max_height));

        let title = resource.metadata.title.as_deref().unwrap_or(&resource.name);
        let mut markup = format!(
            "<iframe src=\"{}\" frameborder=\"0\" allowtransparency",
            html_escape::encode_double_quoted_attribute(src.as_str())
        );
        if let Some(width) = width {
            let _ = write!(markup, " width=\"{}\"", width);
        }
        if let Some(height) = height {
            let _ = write!(markup, " height=\"{}\"", height);
        }
        let _ = write!(
            markup,
            " class=\"media-oembed-content\" loading=\"eager\" title=\"{}\"></iframe>",
            html_escape::encode_double_quoted_attribute(title)
        );
        Ok(markup)
    }

    fn iframe_hash(&self, url: &str, max_width: u32, max_height: u32) -> String {
        let digest = Sha256::digest(
            format!("{}:{}:{}:{}", url, max_width, max_height, self.private_key).as_bytes(),
        );
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn source_file(&self, resource: &Resource) -> Result<FileRecord, RenderError> {
        let file = match resource.source.value {
            SourceValue::File(id) => self.files.load(id),
            _ => None,
        };
        file.ok_or_else(|| RenderError::with_message(ErrorKind::MissingAsset, SOURCE_IMAGE_MISSING))
    }

    fn responsive_image(
        &self,
        resource: &Resource,
        style_id: &str,
        cache: &mut CacheMetadata,
    ) -> Result<String, RenderError> {
        let responsive = self.styles.responsive_image_style(style_id).ok_or_else(|| {
            RenderError::with_message(ErrorKind::InvalidStyleDefinition, RESPONSIVE_STYLE_MISSING)
        })?;
        *cache = std::mem::take(cache).add_dependency(&responsive);

        let file = self.source_file(resource)?;
        *cache = std::mem::take(cache).add_dependency(&file);

        let natural = self.natural_dimensions(resource, &file);
        let alt = html_escape::encode_double_quoted_attribute(&resource.name);

        let mut markup = String::from("<picture>");
        for breakpoint in &responsive.breakpoints {
            let style = self
                .styles
                .image_style(&breakpoint.image_style)
                .ok_or_else(|| RenderError::new(ErrorKind::InvalidStyleDefinition))?;
            *cache = std::mem::take(cache).add_dependency(&style);
            let url = self.derivatives.build_url(&style.id, &file.uri).unwrap_or_default();
            let _ = write!(
                markup,
                "<source srcset=\"{} {}\" media=\"{}\" type=\"{}\"{}/>",
                html_escape::encode_double_quoted_attribute(&url),
                html_escape::encode_double_quoted_attribute(&breakpoint.multiplier),
                html_escape::encode_double_quoted_attribute(&breakpoint.media),
                html_escape::encode_double_quoted_attribute(&file.mime),
                size_attributes(natural.map(|(w, h)| transform_dimensions(&style, w, h)))
            );
        }

        let fallback = self
            .styles
            .image_style(&responsive.fallback_image_style)
            .ok_or_else(|| RenderError::new(ErrorKind::InvalidStyleDefinition))?;
        *cache = std::mem::take(cache).add_dependency(&fallback);
        let url = self.derivatives.build_url(&fallback.id, &file.uri).unwrap_or_default();
        let _ = write!(
            markup,
            "<img loading=\"lazy\"{} src=\"{}\" alt=\"{}\"/></picture>",
            size_attributes(natural.map(|(w, h)| transform_dimensions(&fallback, w, h))),
            html_escape::encode_double_quoted_attribute(&url),
            alt
        );
        Ok(markup)
    }

    fn image(
        &self,
        resource: &Resource,
        style_id: &str,
        cache: &mut CacheMetadata,
    ) -> Result<String, RenderError> {
        let file = self.source_file(resource)?;
        *cache = std::mem::take(cache).add_dependency(&file);
        let natural = self.natural_dimensions(resource, &file);

        let (url, size) = if style_id.is_empty() {
            let url = self.derivatives.files().create_url(&file.uri).map(String::from);
            (url.unwrap_or_default(), natural)
        } else {
            let style = self
                .styles
                .image_style(style_id)
                .ok_or_else(|| RenderError::new(ErrorKind::InvalidStyleDefinition))?;
            *cache = std::mem::take(cache).add_dependency(&style);
            let url = self.derivatives.build_url(&style.id, &file.uri).unwrap_or_default();
            (url, natural.map(|(w, h)| transform_dimensions(&style, w, h)))
        };

        Ok(format!(
            "<img loading=\"lazy\" src=\"{}\"{} alt=\"{}\"/>",
            html_escape::encode_double_quoted_attribute(&url),
            size_attributes(size),
            html_escape::encode_double_quoted_attribute(&resource.name)
        ))
    }

    /// Dimensions of the original image: the stored metadata, or the file
    /// itself when the metadata is incomplete. `None` if neither is known.
    fn natural_dimensions(&self, resource: &Resource, file: &FileRecord) -> Option<(u32, u32)> {
        match (resource.metadata.width, resource.metadata.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => {
                let path = self.derivatives.files().realpath(&file.uri)?;
                image::image_dimensions(path).ok()
            }
        }
    }

    fn file_link(&self, resource: &Resource, cache: &mut CacheMetadata) -> Result<String, RenderError> {
        let file = match resource.source.value {
            SourceValue::File(id) => self.files.load(id),
            _ => None,
        }
        .ok_or_else(|| RenderError::with_message(ErrorKind::MissingAsset, SOURCE_FILE_MISSING))?;
        *cache = std::mem::take(cache).add_dependency(&file);
        let url = self.derivatives.files().create_url(&file.uri).map(String::from).unwrap_or_default();
        Ok(format!(
            "<a href=\"{}\" type=\"{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(&url),
            html_escape::encode_double_quoted_attribute(&file.mime),
            html_escape::encode_text(&file.filename)
        ))
    }
}

impl Renderer for MarkupRenderer {
    fn render(&self, resource: &Resource, field: &str, mode: &str) -> Result<Rendered, RenderError> {
        let mut cache = resource.cache_metadata();

        let display = self
            .displays
            .load_display(MEDIA_TARGET_TYPE, &resource.bundle, mode)
            .ok_or_else(|| RenderError::new(ErrorKind::UnknownDisplayMode).with_cache(&cache))?;
        cache = cache.add_dependency(&display);

        let component = display
            .component(field)
            .ok_or_else(|| RenderError::new(ErrorKind::UnconfiguredDisplay).with_cache(&cache))?;

        let markup = match component {
            Component::OembedVideo { max_width, max_height } => {
                self.video(resource, *max_width, *max_height)
            }
            Component::ResponsiveImage { responsive_image_style } => {
                self.responsive_image(resource, responsive_image_style, &mut cache)
            }
            Component::Image { image_style } => self.image(resource, image_style, &mut cache),
            Component::FileLink => self.file_link(resource, &mut cache),
            Component::Unsupported => Err(RenderError::new(ErrorKind::UnsupportedType)),
        }
        .map_err(|e| e.with_cache(&cache))?;

        Ok(Rendered { markup, cache })
    }
}

/// ` width="…" height="…"`, or nothing when the size is unknown.
fn size_attributes(size: Option<(u32, u32)>) -> String {
    match size {
        Some((width, height)) => format!(" width=\"{}\" height=\"{}\"", width, height),
        None => String::new(),
    }
}

fn non_zero(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}
