//! Resource locator parsing
//!
//! A locator is the URL a consumer sends in the `url` query parameter, e.g.
//! `https://data.example.com/media/7c3a…?view_mode=thumbnail`. Only two things
//! are taken from it: the first UUID in its path and the query parameters,
//! `view_mode` being the display hint.
//!
//! [`EmbedUrlResolver`] goes one level further out and decomposes the stored
//! embed URL (`{service_url}?url={locator}`) that editors save in content.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::models::{DEFAULT_VIEW_MODE, VIEW_MODE_PARAM};

static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-([0-9a-f]{4}-){3}[0-9a-f]{12}").expect("uuid regex")
});

/// Error parsing a locator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed resource URL '{locator}': {reason}")]
    Malformed { locator: String, reason: String },
    #[error("Relative resource URL '{0}' given without a base URL")]
    Relative(String),
    #[error("Resource URL '{0}' does not contain a resource identifier")]
    NoIdentifier(String),
}

/// A locator broken into the parts the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocator {
    /// Absolute form of the locator
    pub url: Url,
    pub identifier: Uuid,
    /// Value of the `view_mode` query parameter
    pub display_hint: Option<String>,
    /// All query parameters, last value wins
    pub query: BTreeMap<String, String>,
}

/// Parses locators, optionally relative to a base URL.
#[derive(Debug, Clone, Default)]
pub struct LocatorParser {
    base_url: Option<Url>,
}

impl LocatorParser {
    pub fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn parse(&self, locator: &str) -> Result<ParsedLocator, ParseError> {
        let locator = locator.trim();
        let url = match Url::parse(locator) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(locator).map_err(|e| ParseError::Malformed {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })?,
                None => return Err(ParseError::Relative(locator.to_string())),
            },
            Err(e) => {
                return Err(ParseError::Malformed {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let identifier = find_uuid(self.relative_path(&url))
            .ok_or_else(|| ParseError::NoIdentifier(locator.to_string()))?;

        let query: BTreeMap<String, String> =
            url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        let display_hint = query.get(VIEW_MODE_PARAM).filter(|v| !v.is_empty()).cloned();

        Ok(ParsedLocator { url, identifier, display_hint, query })
    }

    /// Path of `url` with the base URL's path prefix removed.
    fn relative_path<'a>(&self, url: &'a Url) -> &'a str {
        let path = url.path();
        let Some(base) = &self.base_url else {
            return path;
        };
        if base.host_str() != url.host_str() {
            return path;
        }
        let prefix = base.path().trim_end_matches('/');
        if prefix.is_empty() {
            return path;
        }
        match path.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

fn find_uuid(path: &str) -> Option<Uuid> {
    UUID_REGEX.find(path).and_then(|m| Uuid::parse_str(m.as_str()).ok())
}

/// What an embed URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReference {
    pub uuid: Uuid,
    /// Path segment(s) between the resource base URL and the UUID
    pub entity_type: String,
    pub view_mode: String,
}

/// Decomposes stored embed URLs of the form `{service_url}?url={resource_url}`.
#[derive(Debug, Clone)]
pub struct EmbedUrlResolver {
    service_url: String,
    resource_base_url: String,
}

impl EmbedUrlResolver {
    pub fn new(service_url: impl Into<String>, resource_base_url: impl Into<String>) -> Self {
        Self { service_url: service_url.into(), resource_base_url: resource_base_url.into() }
    }

    /// `None` unless the URL targets this service and a resource under the
    /// resource base URL with a UUID in its path.
    pub fn resolve(&self, embed_url: &str) -> Option<EmbedReference> {
        let resource_url = self.resource_url(embed_url)?;
        let (resource_path, resource_query) = split_query(&resource_url);

        let uuid_match = UUID_REGEX.find(resource_path)?;
        let uuid = Uuid::parse_str(uuid_match.as_str()).ok()?;

        let entity_type = resource_path
            .replace(&self.resource_base_url, "")
            .replace(uuid_match.as_str(), "")
            .trim_matches('/')
            .to_string();

        let view_mode = url::form_urlencoded::parse(resource_query.as_bytes())
            .find(|(k, _)| k == VIEW_MODE_PARAM)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_else(|| DEFAULT_VIEW_MODE.to_string());

        Some(EmbedReference { uuid, entity_type, view_mode })
    }

    pub fn resolve_uuid(&self, embed_url: &str) -> Option<Uuid> {
        self.resolve(embed_url).map(|r| r.uuid)
    }

    /// Build the embed URL for a resource URL.
    pub fn embed_url(&self, resource_url: &str) -> String {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", resource_url)
            .finish();
        format!("{}?{}", self.service_url, query)
    }

    fn resource_url(&self, embed_url: &str) -> Option<String> {
        let (path, query) = split_query(embed_url.trim());
        if path != self.service_url {
            return None;
        }
        let resource_url = url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "url")
            .map(|(_, v)| v.into_owned())?;
        if !resource_url.contains(&self.resource_base_url) {
            return None;
        }
        Some(resource_url)
    }
}

fn split_query(url: &str) -> (&str, &str) {
    let url = url.split('#').next().unwrap_or(url);
    url.split_once('?').unwrap_or((url, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "7c3a9f8e-1d2b-4c5a-9e8f-0a1b2c3d4e5f";

    fn parser() -> LocatorParser {
        LocatorParser::new(Some(Url::parse("https://data.example.com/ewp/").unwrap()))
    }

    #[test]
    fn test_parse_absolute_locator() {
        let parsed = LocatorParser::default()
            .parse(&format!("https://data.example.com/media/{}", UUID))
            .expect("should parse");
        assert_eq!(parsed.identifier.to_string(), UUID);
        assert_eq!(parsed.display_hint, None);
    }

    #[test]
    fn test_parse_display_hint_and_query() {
        let parsed = parser()
            .parse(&format!("https://data.example.com/ewp/media/{}?view_mode=thumbnail&lang=fr", UUID))
            .expect("should parse");
        assert_eq!(parsed.display_hint.as_deref(), Some("thumbnail"));
        assert_eq!(parsed.query.get("lang").map(String::as_str), Some("fr"));
    }

    #[test]
    fn test_parse_relative_with_base() {
        let parsed = parser().parse(&format!("media/{}", UUID)).expect("should join base");
        assert_eq!(parsed.url.as_str(), format!("https://data.example.com/ewp/media/{}", UUID));
    }

    #[test]
    fn test_parse_relative_without_base() {
        let result = LocatorParser::default().parse(&format!("/media/{}", UUID));
        assert!(matches!(result, Err(ParseError::Relative(_))));
    }

    #[test]
    fn test_parse_no_identifier() {
        let result = parser().parse("https://data.example.com/ewp/media/42");
        assert!(matches!(result, Err(ParseError::NoIdentifier(_))));
    }

    #[test]
    fn test_parse_malformed() {
        let result = LocatorParser::default().parse("http://[::1");
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_first_uuid_wins() {
        let other = "00000000-0000-4000-8000-000000000000";
        let parsed = LocatorParser::default()
            .parse(&format!("https://x.test/{}/{}", UUID, other))
            .unwrap();
        assert_eq!(parsed.identifier.to_string(), UUID);
    }

    #[test]
    fn test_parse_uppercase_identifier() {
        let parsed = LocatorParser::default()
            .parse(&format!("https://data.example.com/media/{}", UUID.to_uppercase()))
            .expect("should parse uppercase UUID");
        assert_eq!(parsed.identifier.to_string(), UUID);
    }

    #[test]
    fn test_base_path_is_stripped_before_matching() {
        // A UUID-shaped base path must not be mistaken for the identifier.
        let base = "https://x.test/00000000-0000-4000-8000-000000000000/";
        let parser = LocatorParser::new(Some(Url::parse(base).unwrap()));
        let parsed = parser.parse(&format!("{}media/{}", base, UUID)).unwrap();
        assert_eq!(parsed.identifier.to_string(), UUID);
    }

    fn embed_resolver() -> EmbedUrlResolver {
        EmbedUrlResolver::new("https://oembed.example.com", "https://data.example.com/ewp")
    }

    #[test]
    fn test_embed_url_resolves_reference() {
        let resolver = embed_resolver();
        let embed = resolver.embed_url(&format!(
            "https://data.example.com/ewp/media/{}?view_mode=full",
            UUID
        ));
        let reference = resolver.resolve(&embed).expect("should resolve");
        assert_eq!(reference.uuid.to_string(), UUID);
        assert_eq!(reference.entity_type, "media");
        assert_eq!(reference.view_mode, "full");
    }

    #[test]
    fn test_embed_url_default_view_mode() {
        let resolver = embed_resolver();
        let embed = resolver.embed_url(&format!("https://data.example.com/ewp/media/{}", UUID));
        assert_eq!(resolver.resolve(&embed).unwrap().view_mode, "default");
    }

    #[test]
    fn test_embed_url_uppercase_identifier() {
        let resolver = embed_resolver();
        let embed = resolver.embed_url(&format!(
            "https://data.example.com/ewp/media/{}",
            UUID.to_uppercase()
        ));
        let reference = resolver.resolve(&embed).expect("should resolve uppercase UUID");
        assert_eq!(reference.uuid.to_string(), UUID);
        assert_eq!(reference.entity_type, "media");
    }

    #[test]
    fn test_embed_url_rejects_other_service() {
        let resolver = embed_resolver();
        let embed = format!(
            "https://elsewhere.example.com?url=https://data.example.com/ewp/media/{}",
            UUID
        );
        assert_eq!(resolver.resolve(&embed), None);
    }

    #[test]
    fn test_embed_url_rejects_foreign_resource() {
        let resolver = embed_resolver();
        let embed = resolver.embed_url(&format!("https://other.example.com/media/{}", UUID));
        assert_eq!(resolver.resolve_uuid(&embed), None);
    }

    #[test]
    fn test_embed_url_requires_uuid() {
        let resolver = embed_resolver();
        let embed = resolver.embed_url("https://data.example.com/ewp/media/12");
        assert_eq!(resolver.resolve(&embed), None);
    }
}
