//! Data model for resolvable resources and their display configuration
//!
//! These are the records the collaborators hand to the engine. All of them
//! are plain data, deserializable from the catalog format, and every one the
//! engine reads reports its own cache tag through [`Cacheable`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::cache::{CacheMetadata, Cacheable, MEDIA_TARGET_TYPE};

pub type ResourceId = u64;
pub type FileId = u64;

/// Query parameter carrying the display hint.
pub const VIEW_MODE_PARAM: &str = "view_mode";

/// View mode used when a renderer needs one and no hint was given.
pub const DEFAULT_VIEW_MODE: &str = "default";

/// The kind of source backing a resource.
///
/// Known kinds are dispatched to a built-in resolver; anything else is handed
/// to the extension hooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// Locally stored image file
    Image,
    /// Video hosted by a remote oEmbed provider
    RemoteVideo,
    /// Downloadable document
    File,
    /// Kind without a built-in resolver
    Other(String),
}

impl SourceKind {
    /// Plugin identifier as stored in the catalog.
    pub fn plugin_id(&self) -> &str {
        match self {
            SourceKind::Image => "image",
            SourceKind::RemoteVideo => "oembed:video",
            SourceKind::File => "file",
            SourceKind::Other(id) => id,
        }
    }
}

impl From<String> for SourceKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "image" => SourceKind::Image,
            "oembed:video" | "remote_video" => SourceKind::RemoteVideo,
            "file" => SourceKind::File,
            _ => SourceKind::Other(value),
        }
    }
}

impl From<SourceKind> for String {
    fn from(value: SourceKind) -> Self {
        value.plugin_id().to_string()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plugin_id())
    }
}

/// Value stored in a resource's source field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceValue {
    /// Reference to a [`FileRecord`]
    File(FileId),
    /// URL of a remote resource
    RemoteUrl(String),
    /// Arbitrary payload interpreted by an extension
    Inline(serde_json::Value),
    /// No value
    #[default]
    Empty,
}

impl SourceValue {
    pub fn is_empty(&self) -> bool {
        match self {
            SourceValue::Empty => true,
            SourceValue::RemoteUrl(url) => url.trim().is_empty(),
            SourceValue::Inline(value) => value.is_null(),
            SourceValue::File(_) => false,
        }
    }

    pub fn file_id(&self) -> Option<FileId> {
        match self {
            SourceValue::File(id) => Some(*id),
            _ => None,
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match self {
            SourceValue::RemoteUrl(url) => Some(url),
            _ => None,
        }
    }
}

/// The field holding a resource's source value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    /// Field name, used to look up the display component
    pub name: String,
    #[serde(default)]
    pub value: SourceValue,
}

/// Metadata reported by the source (natural dimensions, provider title).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// An internally addressable piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub uuid: Uuid,
    /// Selects the resolver
    pub kind: SourceKind,
    pub bundle: String,
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub published: bool,
    pub source: SourceField,
    #[serde(default)]
    pub metadata: SourceMetadata,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

impl Cacheable for Resource {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!("{}:{}", MEDIA_TARGET_TYPE, self.id)])
    }
}

/// A stored file backing an image or document resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Stream URI, e.g. `public://example_1.jpeg`
    pub uri: String,
    pub filename: String,
    pub mime: String,
    #[serde(default)]
    pub size: u64,
}

impl Cacheable for FileRecord {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!("file:{}", self.id)])
    }
}

/// A named display mode definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMode {
    pub id: String,
    #[serde(default = "default_target_type")]
    pub target_type: String,
    #[serde(default)]
    pub label: String,
}

fn default_target_type() -> String {
    MEDIA_TARGET_TYPE.to_string()
}

impl Cacheable for ViewMode {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!(
            "config:core.entity_view_mode.{}.{}",
            self.target_type, self.id
        )])
    }
}

/// How a field is formatted in a display configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    /// Single image, optionally through an image style (empty = original)
    Image {
        #[serde(default)]
        image_style: String,
    },
    /// `<picture>` element driven by a responsive image style
    ResponsiveImage { responsive_image_style: String },
    /// Embedded iframe for a remote video (0 = unconstrained)
    OembedVideo {
        #[serde(default)]
        max_width: u32,
        #[serde(default)]
        max_height: u32,
    },
    /// Plain download link
    FileLink,
    /// Any formatter the engine does not know how to describe
    #[serde(other)]
    Unsupported,
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Image { .. } => "image",
            Component::ResponsiveImage { .. } => "responsive_image",
            Component::OembedVideo { .. } => "oembed_video",
            Component::FileLink => "file_link",
            Component::Unsupported => "unsupported",
        }
    }
}

/// Formatter settings for one `(target type, bundle, mode)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfiguration {
    #[serde(default = "default_target_type")]
    pub target_type: String,
    pub bundle: String,
    pub mode: String,
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
}

impl DisplayConfiguration {
    /// Machine name, `{target_type}.{bundle}.{mode}`.
    pub fn id(&self) -> String {
        display_id(&self.target_type, &self.bundle, &self.mode)
    }

    pub fn component(&self, field: &str) -> Option<&Component> {
        self.components.get(field)
    }
}

impl Cacheable for DisplayConfiguration {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!("config:core.entity_view_display.{}", self.id())])
    }
}

pub fn display_id(target_type: &str, bundle: &str, mode: &str) -> String {
    format!("{}.{}.{}", target_type, bundle, mode)
}

/// One step of an image style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "id")]
pub enum ImageEffect {
    /// Fit inside the box, keeping the aspect ratio
    #[serde(rename = "image_scale")]
    Scale {
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
        #[serde(default)]
        upscale: bool,
    },
    /// Exact size, ignoring the aspect ratio
    #[serde(rename = "image_resize")]
    Resize { width: u32, height: u32 },
    /// Cover the box, then crop the center
    #[serde(rename = "image_scale_and_crop")]
    ScaleAndCrop { width: u32, height: u32 },
}

/// A named chain of image effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStyle {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub effects: Vec<ImageEffect>,
}

impl Cacheable for ImageStyle {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!("config:image.style.{}", self.id)])
    }
}

/// A `<source>` entry of a responsive image style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub media: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: String,
    pub image_style: String,
}

fn default_multiplier() -> String {
    "1x".to_string()
}

/// Multi-variant image style; sizes come from its fallback image style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsiveImageStyle {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub fallback_image_style: String,
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
}

impl Cacheable for ResponsiveImageStyle {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!("config:responsive_image.styles.{}", self.id)])
    }
}

/// A generated alternate representation of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derivative {
    pub style_id: String,
    pub source_uri: String,
    pub derived_uri: String,
    /// Public URL, including the itok token
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Cacheable for Derivative {
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::from_tags([format!("config:image.style.{}", self.style_id)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_plugin_id() {
        assert_eq!(SourceKind::from("image".to_string()), SourceKind::Image);
        assert_eq!(SourceKind::from("oembed:video".to_string()), SourceKind::RemoteVideo);
        assert_eq!(SourceKind::from("file".to_string()), SourceKind::File);
        assert_eq!(
            SourceKind::from("test".to_string()),
            SourceKind::Other("test".to_string())
        );
        assert_eq!(String::from(SourceKind::RemoteVideo), "oembed:video");
    }

    #[test]
    fn test_source_value_emptiness() {
        assert!(SourceValue::Empty.is_empty());
        assert!(SourceValue::RemoteUrl("  ".to_string()).is_empty());
        assert!(!SourceValue::File(3).is_empty());
        assert_eq!(SourceValue::File(3).file_id(), Some(3));
        assert_eq!(SourceValue::RemoteUrl("x".into()).file_id(), None);
    }

    #[test]
    fn test_component_deserializes_from_toml() {
        let component: Component = toml::from_str("type = \"image\"\nimage_style = \"thumbnail\"")
            .expect("image component should parse");
        assert_eq!(component, Component::Image { image_style: "thumbnail".to_string() });

        let component: Component =
            toml::from_str("type = \"oembed_video\"\nmax_width = 400\nmax_height = 250")
                .expect("video component should parse");
        assert_eq!(component, Component::OembedVideo { max_width: 400, max_height: 250 });

        let component: Component =
            toml::from_str("type = \"entity_reference_label\"").expect("unknown formatter");
        assert_eq!(component, Component::Unsupported);
    }

    #[test]
    fn test_image_effect_deserializes_by_id() {
        let effect: ImageEffect =
            toml::from_str("id = \"image_scale\"\nwidth = 100\nheight = 100").unwrap();
        assert_eq!(effect, ImageEffect::Scale { width: Some(100), height: Some(100), upscale: false });
    }

    #[test]
    fn test_cache_tags() {
        let display = DisplayConfiguration {
            target_type: "media".to_string(),
            bundle: "image".to_string(),
            mode: "full".to_string(),
            components: BTreeMap::new(),
        };
        assert!(display.cache_metadata().has_tag("config:core.entity_view_display.media.image.full"));

        let mode = ViewMode { id: "full".into(), target_type: "media".into(), label: "Full".into() };
        assert!(mode.cache_metadata().has_tag("config:core.entity_view_mode.media.full"));

        let style = ImageStyle { id: "thumbnail".into(), label: String::new(), effects: vec![] };
        assert!(style.cache_metadata().has_tag("config:image.style.thumbnail"));
    }
}
