//! The `public://` stream wrapper
//!
//! Maps file URIs to paths under the public files directory and to the URLs
//! they are served from.

use std::path::{Component as PathComponent, Path, PathBuf};
use url::Url;

pub const PUBLIC_SCHEME: &str = "public";

/// Public files directory and its base URL.
#[derive(Debug, Clone)]
pub struct PublicFiles {
    root: PathBuf,
    base_url: Url,
}

impl PublicFiles {
    pub fn new(root: impl Into<PathBuf>, base_url: Url) -> Self {
        Self { root: root.into(), base_url }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Scheme of a URI, e.g. `public` for `public://a.jpg`.
    pub fn scheme(uri: &str) -> Option<&str> {
        uri.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Path part of a `public://` URI, `None` for other schemes.
    pub fn target(uri: &str) -> Option<&str> {
        uri.strip_prefix("public://").map(|t| t.trim_start_matches('/'))
    }

    /// Filesystem path of a `public://` URI. Targets escaping the root are
    /// rejected.
    pub fn realpath(&self, uri: &str) -> Option<PathBuf> {
        let target = Self::target(uri)?;
        let relative = Path::new(target);
        if relative.components().any(|c| !matches!(c, PathComponent::Normal(_))) {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Public URL of a `public://` URI.
    pub fn create_url(&self, uri: &str) -> Option<Url> {
        let target = Self::target(uri)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(target.split('/').filter(|s| !s.is_empty()));
        Some(url)
    }
}
