//! The oEmbed endpoint, independent of any HTTP framework
//!
//! Maps a request's `url` parameter and caller to a status code, a JSON body
//! and cache headers:
//!
//! | Outcome | Status |
//! |---|---|
//! | resolved | 200 |
//! | `url` missing, unparseable or without an identifier | 400 |
//! | caller may not view the resource | 403 |
//! | any classified resolution failure | 404 |

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheMetadata, Cacheable, MaxAge, PERMISSIONS_CONTEXT, URL_CONTEXT};
use crate::engine::ResolutionEngine;
use crate::locator::ParseError;
use crate::repository::{AccessChecker, Principal};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_FORBIDDEN: u16 = 403;

/// Default lifetime of cacheable responses, in seconds.
pub const DEFAULT_MAX_AGE: u32 = 3600;

const URL_MISSING: &str = "There is no URL present in the oEmbed request.";
const URL_INVALID: &str = "The oEmbed resource URL is invalid.";
const URL_WITHOUT_UUID: &str = "The oEmbed resource URL does not contain a valid resource UUID.";
const ACCESS_DENIED: &str = "You are not authorized to access the requested oEmbed resource.";

/// A response ready to be written by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: Value,
    pub cache: CacheMetadata,
    max_age: MaxAge,
}

impl EndpointResponse {
    fn new(status: u16, body: Value, cache: CacheMetadata, max_age: MaxAge) -> Self {
        Self { status, body, cache, max_age }
    }

    fn error(status: u16, error: &str, message: &str, cache: CacheMetadata) -> Self {
        let body = json!({ "error": error, "message": message });
        Self::new(status, body, cache, MaxAge::Seconds(0))
    }

    /// Effective max-age: the endpoint's limit capped by the dependencies.
    pub fn max_age(&self) -> MaxAge {
        self.max_age.min(self.cache.max_age())
    }

    pub fn cache_control(&self) -> String {
        match self.max_age() {
            MaxAge::Seconds(0) => "no-cache".to_string(),
            MaxAge::Seconds(secs) => format!("max-age={}, public", secs),
            MaxAge::Permanent => format!("max-age={}, public", u32::MAX),
        }
    }

    /// Headers describing the cacheability of the response.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let contexts = self.cache.contexts().iter().cloned().collect::<Vec<_>>().join(" ");
        vec![
            ("content-type", "application/json".to_string()),
            ("cache-control", self.cache_control()),
            ("cache-tags", self.cache.tags_header()),
            ("cache-contexts", contexts),
        ]
    }
}

/// The endpoint controller.
pub struct OembedEndpoint {
    engine: Arc<ResolutionEngine>,
    access: Arc<dyn AccessChecker>,
    max_age: MaxAge,
}

impl OembedEndpoint {
    pub fn new(engine: Arc<ResolutionEngine>, access: Arc<dyn AccessChecker>) -> Self {
        Self { engine, access, max_age: MaxAge::Seconds(DEFAULT_MAX_AGE) }
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn engine(&self) -> &Arc<ResolutionEngine> {
        &self.engine
    }

    /// Handle a raw query string such as `url=https%3A%2F%2F…`.
    pub fn handle_query(&self, query: &str, principal: &Principal) -> EndpointResponse {
        let url = url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "url")
            .map(|(_, v)| v.into_owned());
        self.handle(url.as_deref(), principal)
    }

    /// Handle a request with the given `url` parameter.
    pub fn handle(&self, url: Option<&str>, principal: &Principal) -> EndpointResponse {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            let cache = CacheMetadata::new().with_context(URL_CONTEXT);
            return EndpointResponse::error(STATUS_BAD_REQUEST, "bad_request", URL_MISSING, cache);
        };

        let parsed = match self.engine.parser().parse(url) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(%error, "rejecting oEmbed request");
                let message = match error {
                    ParseError::NoIdentifier(_) => URL_WITHOUT_UUID,
                    ParseError::Malformed { .. } | ParseError::Relative(_) => URL_INVALID,
                };
                let cache = self.engine.baseline();
                return EndpointResponse::error(STATUS_BAD_REQUEST, "bad_request", message, cache);
            }
        };

        let outcome = match self.engine.lookup(&parsed.identifier) {
            Some(resource) if !self.access.can_view(&resource, principal) => {
                let cache = self
                    .engine
                    .baseline()
                    .merge(&resource.cache_metadata())
                    .with_context(PERMISSIONS_CONTEXT);
                return EndpointResponse::error(STATUS_FORBIDDEN, "access_denied", ACCESS_DENIED, cache);
            }
            Some(resource) => self.engine.resolve_resource(
                &resource,
                parsed.display_hint.as_deref(),
                &parsed.query,
            ),
            None => self.engine.resolve_parsed(&parsed),
        };

        match outcome {
            Ok(resolution) => {
                let cache = resolution.cache.with_context(PERMISSIONS_CONTEXT);
                EndpointResponse::new(STATUS_OK, Value::Object(resolution.payload), cache, self.max_age)
            }
            Err(error) => {
                let body = json!({ "error": error.kind, "message": error.message });
                let cache = error.cache.with_context(PERMISSIONS_CONTEXT);
                EndpointResponse::new(error.kind.http_status(), body, cache, self.max_age)
            }
        }
    }
}
