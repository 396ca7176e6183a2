//! Classified resolution failures
//!
//! A failed resolution is data: a kind the endpoint maps to a status code, a
//! human readable message and the cache metadata collected up to the failure.
//! The metadata matters as much as for a success, since a cached 404 must be
//! dropped once the display or resource it was about changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::cache::CacheMetadata;

/// Failure classes of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No resource with the requested identifier
    ResourceNotFound,
    /// The display hint names a display that does not exist
    UnknownDisplayMode,
    /// The display exists but does not show the source field
    UnconfiguredDisplay,
    /// The backing file, derivative or dimensions are missing
    MissingAsset,
    /// No resolver or formatter handles the request
    UnsupportedType,
    /// The display references an undefined style
    InvalidStyleDefinition,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ResourceNotFound => "resource_not_found",
            ErrorKind::UnknownDisplayMode => "unknown_display_mode",
            ErrorKind::UnconfiguredDisplay => "unconfigured_display",
            ErrorKind::MissingAsset => "missing_asset",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::InvalidStyleDefinition => "invalid_style_definition",
        }
    }

    /// Every kind is reported to consumers as not found.
    pub fn http_status(&self) -> u16 {
        404
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::ResourceNotFound => "The requested media entity was not found.",
            ErrorKind::UnknownDisplayMode => "The requested entity view display does not exist.",
            ErrorKind::UnconfiguredDisplay => {
                "The media source field is not configured to show on this view mode."
            }
            ErrorKind::MissingAsset => "The media entity has no source field value.",
            ErrorKind::UnsupportedType => "A non-supported media type has been requested.",
            ErrorKind::InvalidStyleDefinition => {
                "The image style the formatter is using does not exist."
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SOURCE_IMAGE_MISSING: &str = "The source image is missing.";
pub const SOURCE_FILE_MISSING: &str = "The source file is missing.";
pub const RESPONSIVE_STYLE_MISSING: &str =
    "The responsive image style the formatter is using does not exist.";
pub const DIMENSIONS_MISSING: &str = "The media entity has no dimensions to embed.";

/// A classified failure with the cache dependencies gathered so far.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolveError {
    pub kind: ErrorKind,
    pub message: String,
    pub cache: CacheMetadata,
}

impl ResolveError {
    /// Error with the kind's default message and no metadata yet.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, message: kind.default_message().to_string(), cache: CacheMetadata::new() }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), cache: CacheMetadata::new() }
    }

    /// Merge more dependencies into the error.
    pub fn with_cache(mut self, cache: &CacheMetadata) -> Self {
        self.cache = self.cache.merge(cache);
        self
    }
}
