//! The resolution engine
//!
//! Turns a locator into a payload or a classified failure:
//!
//! ```text
//! locator ─► parse ─► lookup ─► dispatch ─► alter hooks ─► Resolution
//!               │         │          │
//!               └─────────┴──────────┴────► failure (+ baseline cache)
//! ```
//!
//! Every outcome carries the baseline dependencies merged with whatever the
//! steps read. The engine holds no mutable state and is shared between
//! threads behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::{self, CacheMetadata, Cacheable};
use crate::catalog::Catalog;
use crate::derivative::DerivativeGenerator;
use crate::error::{ErrorKind, ResolveError};
use crate::hooks::{HookRegistry, Payload};
use crate::locator::{LocatorParser, ParseError, ParsedLocator};
use crate::models::{Resource, ResourceId};
use crate::repository::{
    DisplayRepository, FileRepository, Renderer, ResourceRepository, StyleRepository,
};
use crate::resolver::{self, ResolveContext, ResolveRequest};

/// The collaborators the engine reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub resources: Arc<dyn ResourceRepository>,
    pub files: Arc<dyn FileRepository>,
    pub displays: Arc<dyn DisplayRepository>,
    pub styles: Arc<dyn StyleRepository>,
    pub renderer: Arc<dyn Renderer>,
}

impl Collaborators {
    /// Use one catalog for every storage collaborator.
    pub fn from_catalog(catalog: Arc<Catalog>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            resources: catalog.clone(),
            files: catalog.clone(),
            displays: catalog.clone(),
            styles: catalog,
            renderer,
        }
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resource_id: ResourceId,
    pub resource_uuid: Uuid,
    pub payload: Payload,
    pub cache: CacheMetadata,
}

impl Cacheable for Resolution {
    fn cache_metadata(&self) -> CacheMetadata {
        self.cache.clone()
    }
}

/// Why a locator could not be resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionFailure {
    /// The locator itself is unusable
    #[error("{error}")]
    Parse { error: ParseError, cache: CacheMetadata },
    /// The locator was fine but resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ResolutionFailure {
    pub fn cache(&self) -> &CacheMetadata {
        match self {
            ResolutionFailure::Parse { cache, .. } => cache,
            ResolutionFailure::Resolve(error) => &error.cache,
        }
    }

    /// Classification, `None` for parse failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ResolutionFailure::Parse { .. } => None,
            ResolutionFailure::Resolve(error) => Some(error.kind),
        }
    }
}

/// Resolves locators against a set of collaborators.
pub struct ResolutionEngine {
    collaborators: Collaborators,
    derivatives: DerivativeGenerator,
    hooks: HookRegistry,
    parser: LocatorParser,
}

impl ResolutionEngine {
    pub fn new(
        collaborators: Collaborators,
        derivatives: DerivativeGenerator,
        parser: LocatorParser,
    ) -> Self {
        Self { collaborators, derivatives, hooks: HookRegistry::new(), parser }
    }

    /// Replace the hook registry. Hooks are fixed once the engine is shared.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn parser(&self) -> &LocatorParser {
        &self.parser
    }

    pub fn derivatives(&self) -> &DerivativeGenerator {
        &self.derivatives
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Dependencies attached to every outcome.
    pub fn baseline(&self) -> CacheMetadata {
        cache::baseline(self.collaborators.displays.as_ref())
    }

    /// Parse and resolve a locator.
    #[instrument(skip(self))]
    pub fn resolve(&self, locator: &str) -> Result<Resolution, ResolutionFailure> {
        let parsed = self.parser.parse(locator).map_err(|error| {
            debug!(%error, "locator rejected");
            ResolutionFailure::Parse { error, cache: self.baseline() }
        })?;
        Ok(self.resolve_parsed(&parsed)?)
    }

    /// Resolve an already parsed locator.
    pub fn resolve_parsed(&self, parsed: &ParsedLocator) -> Result<Resolution, ResolveError> {
        let Some(resource) = self.lookup(&parsed.identifier) else {
            warn!(uuid = %parsed.identifier, "resource not found");
            return Err(ResolveError::new(ErrorKind::ResourceNotFound).with_cache(&self.baseline()));
        };
        self.resolve_resource(&resource, parsed.display_hint.as_deref(), &parsed.query)
    }

    pub fn lookup(&self, uuid: &Uuid) -> Option<Resource> {
        self.collaborators.resources.load_by_uuid(uuid)
    }

    /// Resolve a loaded resource with the given hints.
    pub fn resolve_resource(
        &self,
        resource: &Resource,
        display_hint: Option<&str>,
        query: &BTreeMap<String, String>,
    ) -> Result<Resolution, ResolveError> {
        let baseline = self.baseline();
        let context = self.context();
        let request = ResolveRequest { resource, display_hint, query };

        let resolved = resolver::dispatch(&context, &request).map_err(|error| {
            warn!(kind = %error.kind, resource = resource.id, "{}", error.message);
            error.with_cache(&baseline)
        })?;

        let altered = resolver::alter(&context, &request, resolved);
        let payload = altered.payload;
        let cache = baseline.merge(&altered.cache);
        debug!(resource = resource.id, tags = cache.tags().len(), "resolved");

        Ok(Resolution { resource_id: resource.id, resource_uuid: resource.uuid, payload, cache })
    }

    fn context(&self) -> ResolveContext<'_> {
        ResolveContext {
            files: self.collaborators.files.as_ref(),
            displays: self.collaborators.displays.as_ref(),
            styles: self.collaborators.styles.as_ref(),
            renderer: self.collaborators.renderer.as_ref(),
            derivatives: &self.derivatives,
            hooks: &self.hooks,
        }
    }
}
