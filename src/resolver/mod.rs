//! Type dispatch and per-kind resolvers
//!
//! The dispatcher validates what every kind has in common (a source value, a
//! display for the hint) and hands the resource to the resolver of its source
//! kind. Kinds without a built-in resolver go to the extension hooks.
//!
//! Each resolver threads a [`CacheMetadata`] accumulator through its steps
//! and attaches it to whatever it returns, success or failure.

mod file;
mod image;
mod video;

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::cache::{CacheMetadata, Cacheable, MEDIA_TARGET_TYPE};
use crate::derivative::DerivativeGenerator;
use crate::error::{ErrorKind, ResolveError};
use crate::hooks::{Contribution, HookContext, HookRegistry, Payload};
use crate::models::{Component, DisplayConfiguration, Resource, SourceKind};
use crate::repository::{DisplayRepository, FileRepository, RenderError, Renderer, StyleRepository};

/// oEmbed version reported in every payload.
pub const OEMBED_VERSION: &str = "1.0";

/// Everything a resolver may read from.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub files: &'a dyn FileRepository,
    pub displays: &'a dyn DisplayRepository,
    pub styles: &'a dyn StyleRepository,
    pub renderer: &'a dyn Renderer,
    pub derivatives: &'a DerivativeGenerator,
    pub hooks: &'a HookRegistry,
}

/// A resource to resolve and the hints it was requested with.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub resource: &'a Resource,
    pub display_hint: Option<&'a str>,
    pub query: &'a BTreeMap<String, String>,
}

impl<'a> ResolveRequest<'a> {
    fn hook_context(&self) -> HookContext<'a> {
        HookContext { resource: self.resource, display_hint: self.display_hint, query: self.query }
    }
}

/// A resolved payload and its dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub payload: Payload,
    pub cache: CacheMetadata,
}

/// Resolve a loaded resource to a payload.
pub fn dispatch(context: &ResolveContext<'_>, request: &ResolveRequest<'_>) -> Result<Resolved, ResolveError> {
    let resource = request.resource;
    let mut cache = resource.cache_metadata();

    if resource.source.value.is_empty() {
        return Err(fail(ErrorKind::MissingAsset, None, &cache));
    }

    let display = match request.display_hint {
        Some(mode) => {
            let display = context
                .displays
                .load_display(MEDIA_TARGET_TYPE, &resource.bundle, mode)
                .ok_or_else(|| fail(ErrorKind::UnknownDisplayMode, None, &cache))?;
            cache = cache.add_dependency(&display);
            Some(display)
        }
        None => None,
    };

    debug!(kind = %resource.kind, hint = ?request.display_hint, "dispatching");
    let mut resolved = match &resource.kind {
        SourceKind::Image => image::resolve(context, request, display.as_ref(), cache)?,
        SourceKind::RemoteVideo => video::resolve(context, request, display.as_ref(), cache)?,
        SourceKind::File => file::resolve(context, request, cache)?,
        SourceKind::Other(_) => {
            let contribution = context
                .hooks
                .resolve_source(&request.hook_context())
                .ok_or_else(|| fail(ErrorKind::UnsupportedType, None, &cache))?;
            Resolved { payload: contribution.payload, cache: cache.merge(&contribution.cache) }
        }
    };

    resolved.payload.insert("version".to_string(), Value::from(OEMBED_VERSION));
    resolved
        .payload
        .entry("lang")
        .or_insert_with(|| Value::from(resource.language.clone()));
    Ok(resolved)
}

/// Run the alter hooks over a resolved payload.
///
/// Hooks cannot take `version` away, and a `type` that was removed or is no
/// longer a string falls back to the dispatcher's value.
pub fn alter(context: &ResolveContext<'_>, request: &ResolveRequest<'_>, resolved: Resolved) -> Resolved {
    let kind = resolved.payload.get("type").cloned();
    let altered = context.hooks.alter(
        Contribution { payload: resolved.payload, cache: resolved.cache },
        &request.hook_context(),
    );

    let mut payload = altered.payload;
    payload.insert("version".to_string(), Value::from(OEMBED_VERSION));
    if !payload.get("type").is_some_and(Value::is_string) {
        if let Some(kind) = kind {
            debug!(resource = request.resource.id, "alter hooks dropped the payload type");
            payload.insert("type".to_string(), kind);
        }
    }
    Resolved { payload, cache: altered.cache }
}

/// Component configured for the resource's source field, if any.
fn source_component<'d>(
    resource: &Resource,
    display: &'d DisplayConfiguration,
    cache: &CacheMetadata,
) -> Result<&'d Component, ResolveError> {
    display
        .component(&resource.source.name)
        .ok_or_else(|| fail(ErrorKind::UnconfiguredDisplay, None, cache))
}

fn fail(kind: ErrorKind, message: Option<&str>, cache: &CacheMetadata) -> ResolveError {
    match message {
        Some(message) => ResolveError::with_message(kind, message),
        None => ResolveError::new(kind),
    }
    .with_cache(cache)
}

/// Renderer failures keep their own classification.
fn render_failure(error: RenderError, cache: &CacheMetadata) -> ResolveError {
    ResolveError::with_message(error.kind(), error.message()).with_cache(cache).with_cache(error.cache())
}

fn insert_dimensions(payload: &mut Payload, width: u32, height: u32) {
    payload.insert("width".to_string(), Value::from(width));
    payload.insert("height".to_string(), Value::from(height));
}

fn payload_of_type(kind: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("type".to_string(), Value::from(kind));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::files::PublicFiles;
    use crate::hooks::SourceOutcome;
    use crate::models::{SourceField, SourceMetadata, SourceValue};
    use crate::render::MarkupRenderer;
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;
    use uuid::Uuid;

    struct Fixture {
        catalog: Arc<Catalog>,
        renderer: MarkupRenderer,
        derivatives: DerivativeGenerator,
        hooks: HookRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = Arc::new(Catalog::new());
            let files = PublicFiles::new("/nonexistent", Url::parse("https://example.com/files/").unwrap());
            let derivatives = DerivativeGenerator::new(files, "key");
            let renderer = MarkupRenderer::new(
                catalog.clone(),
                catalog.clone(),
                catalog.clone(),
                derivatives.clone(),
                Url::parse("https://example.com/").unwrap(),
                "key",
            );
            Self { catalog, renderer, derivatives, hooks: HookRegistry::new() }
        }

        fn context(&self) -> ResolveContext<'_> {
            ResolveContext {
                files: self.catalog.as_ref(),
                displays: self.catalog.as_ref(),
                styles: self.catalog.as_ref(),
                renderer: &self.renderer,
                derivatives: &self.derivatives,
                hooks: &self.hooks,
            }
        }
    }

    fn custom(value: SourceValue) -> Resource {
        Resource {
            id: 5,
            uuid: Uuid::nil(),
            kind: SourceKind::Other("test".to_string()),
            bundle: "test".to_string(),
            name: "Custom".to_string(),
            language: "fr".to_string(),
            published: true,
            source: SourceField { name: "field_media_test".to_string(), value },
            metadata: SourceMetadata::default(),
        }
    }

    #[test]
    fn test_empty_source_is_missing_asset() {
        let fixture = Fixture::new();
        let resource = custom(SourceValue::Empty);
        let query = BTreeMap::new();
        let request = ResolveRequest { resource: &resource, display_hint: None, query: &query };

        let error = dispatch(&fixture.context(), &request).unwrap_err();
        assert_eq!(error.kind, ErrorKind::MissingAsset);
        assert_eq!(error.message, "The media entity has no source field value.");
        assert!(error.cache.has_tag("media:5"));
    }

    #[test]
    fn test_unknown_display_mode() {
        let fixture = Fixture::new();
        let resource = custom(SourceValue::Inline(json!("x")));
        let query = BTreeMap::new();
        let request = ResolveRequest { resource: &resource, display_hint: Some("nope"), query: &query };

        let error = dispatch(&fixture.context(), &request).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownDisplayMode);
    }

    #[test]
    fn test_unknown_kind_without_hooks_is_unsupported() {
        let fixture = Fixture::new();
        let resource = custom(SourceValue::Inline(json!("x")));
        let query = BTreeMap::new();
        let request = ResolveRequest { resource: &resource, display_hint: None, query: &query };

        let error = dispatch(&fixture.context(), &request).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnsupportedType);
        assert_eq!(error.message, "A non-supported media type has been requested.");
    }

    #[test]
    fn test_alter_keeps_version_and_type() {
        let mut fixture = Fixture::new();
        fixture.hooks.register_alter("strip", 0, |mut c: Contribution, _: &HookContext<'_>| {
            c.payload.remove("version");
            c.payload.insert("type".to_string(), json!(3));
            c.payload.insert("title".to_string(), json!("Custom"));
            c
        });
        let resource = custom(SourceValue::Inline(json!("x")));
        let query = BTreeMap::new();
        let request = ResolveRequest { resource: &resource, display_hint: None, query: &query };

        let mut payload = payload_of_type("rich");
        payload.insert("version".to_string(), json!(OEMBED_VERSION));
        let resolved = Resolved { payload, cache: CacheMetadata::from_tags(["media:5"]) };

        let altered = alter(&fixture.context(), &request, resolved);
        assert_eq!(altered.payload["version"], "1.0");
        assert_eq!(altered.payload["type"], "rich");
        assert_eq!(altered.payload["title"], "Custom");
        assert!(altered.cache.has_tag("media:5"));
    }

    #[test]
    fn test_unknown_kind_resolved_by_hook() {
        let mut fixture = Fixture::new();
        fixture.hooks.register_source("test", 0, |ctx: &HookContext<'_>| {
            let mut payload = payload_of_type("rich");
            payload.insert("html".to_string(), json!(format!("<p>{}</p>", ctx.resource.name)));
            SourceOutcome::Provide(
                Contribution::new(payload).with_cache(CacheMetadata::from_tags(["custom:1"])),
            )
        });
        let resource = custom(SourceValue::Inline(json!("x")));
        let query = BTreeMap::new();
        let request = ResolveRequest { resource: &resource, display_hint: None, query: &query };

        let resolved = dispatch(&fixture.context(), &request).unwrap();
        assert_eq!(resolved.payload["type"], "rich");
        assert_eq!(resolved.payload["version"], "1.0");
        assert_eq!(resolved.payload["lang"], "fr");
        assert!(resolved.cache.has_tag("custom:1"));
        assert!(resolved.cache.has_tag("media:5"));
    }
}
