//! Image resources
//!
//! Without a display hint the original image is described. With one, the
//! source field's formatter decides: a plain image formatter gives the
//! original or an image style derivative, a responsive image formatter gives
//! `<picture>` markup sized by its fallback style.

use serde_json::Value;

use super::{
    fail, insert_dimensions, payload_of_type, render_failure, source_component, ResolveContext,
    ResolveRequest, Resolved,
};
use crate::cache::CacheMetadata;
use crate::derivative::DerivativeError;
use crate::error::{ErrorKind, ResolveError, RESPONSIVE_STYLE_MISSING, SOURCE_IMAGE_MISSING};
use crate::models::{Component, DisplayConfiguration, FileRecord, DEFAULT_VIEW_MODE};

pub(super) fn resolve(
    context: &ResolveContext<'_>,
    request: &ResolveRequest<'_>,
    display: Option<&DisplayConfiguration>,
    mut cache: CacheMetadata,
) -> Result<Resolved, ResolveError> {
    let resource = request.resource;
    let file = resource
        .source
        .value
        .file_id()
        .and_then(|id| context.files.load(id))
        .ok_or_else(|| fail(ErrorKind::MissingAsset, Some(SOURCE_IMAGE_MISSING), &cache))?;
    cache = cache.add_dependency(&file);

    let Some(display) = display else {
        return original(context, request, &file, cache);
    };

    match source_component(resource, display, &cache)? {
        Component::Image { image_style } if image_style.is_empty() => {
            original(context, request, &file, cache)
        }
        Component::Image { image_style } => {
            let style = context.styles.image_style(image_style).ok_or_else(|| {
                fail(ErrorKind::InvalidStyleDefinition, None, &cache)
            })?;
            cache = cache.add_dependency(&style);

            let derivative = context
                .derivatives
                .ensure(&style, &file.uri)
                .map_err(|e| derivative_failure(e, &cache))?;

            let mut payload = payload_of_type("photo");
            payload.insert("url".to_string(), Value::from(derivative.url));
            insert_dimensions(&mut payload, derivative.width, derivative.height);
            Ok(Resolved { payload, cache })
        }
        Component::ResponsiveImage { responsive_image_style } => {
            let responsive =
                context.styles.responsive_image_style(responsive_image_style).ok_or_else(|| {
                    fail(ErrorKind::InvalidStyleDefinition, Some(RESPONSIVE_STYLE_MISSING), &cache)
                })?;
            cache = cache.add_dependency(&responsive);

            let fallback = context
                .styles
                .image_style(&responsive.fallback_image_style)
                .ok_or_else(|| fail(ErrorKind::InvalidStyleDefinition, None, &cache))?;
            cache = cache.add_dependency(&fallback);

            let derivative = context
                .derivatives
                .ensure_responsive(&responsive, &fallback, &file.uri)
                .map_err(|e| derivative_failure(e, &cache))?;

            let mode = request.display_hint.unwrap_or(DEFAULT_VIEW_MODE);
            let rendered = context
                .renderer
                .render(resource, &resource.source.name, mode)
                .map_err(|e| render_failure(e, &cache))?;
            cache = cache.merge(&rendered.cache);

            let mut payload = payload_of_type("rich");
            payload.insert("html".to_string(), Value::from(rendered.markup));
            insert_dimensions(&mut payload, derivative.width, derivative.height);
            Ok(Resolved { payload, cache })
        }
        _ => Err(fail(ErrorKind::UnsupportedType, None, &cache)),
    }
}

/// Describe the original image.
fn original(
    context: &ResolveContext<'_>,
    request: &ResolveRequest<'_>,
    file: &FileRecord,
    cache: CacheMetadata,
) -> Result<Resolved, ResolveError> {
    let files = context.derivatives.files();
    let url = files
        .create_url(&file.uri)
        .ok_or_else(|| fail(ErrorKind::MissingAsset, Some(SOURCE_IMAGE_MISSING), &cache))?;

    let metadata = &request.resource.metadata;
    let (width, height) = match (metadata.width, metadata.height) {
        (Some(width), Some(height)) => (width, height),
        _ => files
            .realpath(&file.uri)
            .and_then(|path| ::image::image_dimensions(path).ok())
            .ok_or_else(|| fail(ErrorKind::MissingAsset, Some(SOURCE_IMAGE_MISSING), &cache))?,
    };

    let mut payload = payload_of_type("photo");
    payload.insert("url".to_string(), Value::from(String::from(url)));
    insert_dimensions(&mut payload, width, height);
    Ok(Resolved { payload, cache })
}

fn derivative_failure(error: DerivativeError, cache: &CacheMetadata) -> ResolveError {
    let message = match &error {
        DerivativeError::SourceMissing(_) => SOURCE_IMAGE_MISSING.to_string(),
        other => other.to_string(),
    };
    fail(ErrorKind::MissingAsset, Some(&message), cache)
}
