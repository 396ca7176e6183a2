//! Configuration schema types for `oembed.toml`
//!
//! Defines the structure and validation rules for the resolver configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::cache::MaxAge;
use crate::derivative::DEFAULT_JPEG_QUALITY;
use crate::endpoint::DEFAULT_MAX_AGE;
use crate::repository::VIEW_MEDIA;

/// Where the service is reachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Site base URL; relative locators are resolved against it
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the oEmbed endpoint
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Prefix every resource URL in stored embed URLs starts with
    #[serde(default = "default_resource_base_url")]
    pub resource_base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint_path: default_endpoint_path(),
            resource_base_url: default_resource_base_url(),
        }
    }
}

impl ServiceConfig {
    /// Absolute URL of the oEmbed endpoint.
    pub fn service_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint_path)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_endpoint_path() -> String {
    "/oembed".to_string()
}

fn default_resource_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Public files directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Directory `public://` URIs map to
    #[serde(default = "default_public_root")]
    pub public_root: PathBuf,
    /// URL the directory is served from
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self { public_root: default_public_root(), public_url: default_public_url() }
    }
}

fn default_public_root() -> PathBuf {
    PathBuf::from("files")
}

fn default_public_url() -> String {
    "http://localhost:8080/files/".to_string()
}

/// Image style derivative settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativesConfig {
    /// Secret mixed into derivative tokens
    #[serde(default)]
    pub private_key: String,
    /// JPEG quality of generated derivatives (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for DerivativesConfig {
    fn default() -> Self {
        Self { private_key: String::new(), jpeg_quality: default_jpeg_quality() }
    }
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

/// Response caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Max-age of cacheable responses in seconds, -1 for permanent
    #[serde(default = "default_max_age")]
    pub max_age: MaxAge,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_age: default_max_age() }
    }
}

fn default_max_age() -> MaxAge {
    MaxAge::Seconds(DEFAULT_MAX_AGE)
}

/// HTTP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissions granted to anonymous requests
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), permissions: default_permissions() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_permissions() -> Vec<String> {
    vec![VIEW_MEDIA.to_string()]
}

/// Catalog location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// TOML catalog file; an empty catalog is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Root configuration structure for `oembed.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OembedConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub derivatives: DerivativesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "service.base_url")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "oembed.toml: '{}' {}", self.field, self.message)
    }
}

impl OembedConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("service.base_url", &self.service.base_url),
            ("service.resource_base_url", &self.service.resource_base_url),
            ("files.public_url", &self.files.public_url),
        ] {
            if let Err(e) = Url::parse(value) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("must be an absolute URL ({})", e),
                });
            }
        }

        if !self.service.endpoint_path.starts_with('/') {
            errors.push(ConfigValidationError {
                field: "service.endpoint_path".to_string(),
                message: "must start with '/'".to_string(),
            });
        }

        if !(1..=100).contains(&self.derivatives.jpeg_quality) {
            errors.push(ConfigValidationError {
                field: "derivatives.jpeg_quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        if self.server.port == 0 {
            errors.push(ConfigValidationError {
                field: "server.port".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
