//! Remote video resources
//!
//! Videos are always described through a display: the hinted one or the
//! default display of the bundle. The iframe markup comes from the renderer.

use serde_json::Value;

use super::{
    fail, insert_dimensions, payload_of_type, render_failure, source_component, ResolveContext,
    ResolveRequest, Resolved,
};
use crate::cache::{CacheMetadata, MEDIA_TARGET_TYPE};
use crate::error::{ErrorKind, ResolveError, DIMENSIONS_MISSING};
use crate::models::{Component, DisplayConfiguration, DEFAULT_VIEW_MODE};

pub(super) fn resolve(
    context: &ResolveContext<'_>,
    request: &ResolveRequest<'_>,
    display: Option<&DisplayConfiguration>,
    mut cache: CacheMetadata,
) -> Result<Resolved, ResolveError> {
    let resource = request.resource;
    let mode = request.display_hint.unwrap_or(DEFAULT_VIEW_MODE);

    let loaded;
    let display = match display {
        Some(display) => display,
        None => {
            loaded = context
                .displays
                .load_display(MEDIA_TARGET_TYPE, &resource.bundle, mode)
                .ok_or_else(|| fail(ErrorKind::UnconfiguredDisplay, None, &cache))?;
            cache = cache.add_dependency(&loaded);
            &loaded
        }
    };

    let (max_width, max_height) = match source_component(resource, display, &cache)? {
        Component::OembedVideo { max_width, max_height } => (*max_width, *max_height),
        _ => (0, 0),
    };

    let rendered = context
        .renderer
        .render(resource, &resource.source.name, mode)
        .map_err(|e| render_failure(e, &cache))?;
    cache = cache.merge(&rendered.cache);

    let width = Some(max_width).filter(|w| *w > 0).or(resource.metadata.width);
    let height = Some(max_height).filter(|h| *h > 0).or(resource.metadata.height);
    let (Some(width), Some(height)) = (width, height) else {
        return Err(fail(ErrorKind::MissingAsset, Some(DIMENSIONS_MISSING), &cache));
    };

    let mut payload = payload_of_type("video");
    payload.insert("html".to_string(), Value::from(rendered.markup));
    insert_dimensions(&mut payload, width, height);
    Ok(Resolved { payload, cache })
}
