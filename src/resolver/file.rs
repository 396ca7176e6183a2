//! Document resources, described as a download link.

use serde_json::Value;

use super::{fail, payload_of_type, ResolveContext, ResolveRequest, Resolved};
use crate::cache::CacheMetadata;
use crate::error::{ErrorKind, ResolveError, SOURCE_FILE_MISSING};

pub(super) fn resolve(
    context: &ResolveContext<'_>,
    request: &ResolveRequest<'_>,
    mut cache: CacheMetadata,
) -> Result<Resolved, ResolveError> {
    let resource = request.resource;
    let file = resource
        .source
        .value
        .file_id()
        .and_then(|id| context.files.load(id))
        .ok_or_else(|| fail(ErrorKind::MissingAsset, Some(SOURCE_FILE_MISSING), &cache))?;
    cache = cache.add_dependency(&file);

    let download = context
        .derivatives
        .files()
        .create_url(&file.uri)
        .ok_or_else(|| fail(ErrorKind::MissingAsset, Some(SOURCE_FILE_MISSING), &cache))?;

    let mut payload = payload_of_type("link");
    payload.insert("name".to_string(), Value::from(resource.name.clone()));
    payload.insert("download".to_string(), Value::from(String::from(download)));
    payload.insert("size".to_string(), Value::from(file.size));
    payload.insert("mime".to_string(), Value::from(file.mime));
    payload.insert("mid".to_string(), Value::from(resource.id));
    Ok(Resolved { payload, cache })
}
