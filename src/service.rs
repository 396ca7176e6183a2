//! Wiring of a complete resolver from `oembed.toml`

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::catalog::{Catalog, CatalogError};
use crate::config::OembedConfig;
use crate::derivative::DerivativeGenerator;
use crate::endpoint::OembedEndpoint;
use crate::engine::{Collaborators, ResolutionEngine};
use crate::files::PublicFiles;
use crate::hooks::HookRegistry;
use crate::locator::{EmbedUrlResolver, LocatorParser};
use crate::render::MarkupRenderer;
use crate::repository::{AccessChecker, Principal};

/// Error building a service from configuration
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Invalid URL in '{field}': {source}")]
    Url {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Every piece of a running resolver, built from one configuration.
pub struct OembedService {
    pub catalog: Arc<Catalog>,
    pub engine: Arc<ResolutionEngine>,
    pub embed_urls: EmbedUrlResolver,
    config: OembedConfig,
}

impl OembedService {
    /// Build a service, loading the configured catalog if there is one.
    pub fn from_config(config: OembedConfig) -> Result<Self, ServiceError> {
        let catalog = match config.catalog.path {
            Some(ref path) => {
                debug!(path = %path.display(), "loading catalog");
                Catalog::load(path)?
            }
            None => Catalog::new(),
        };
        Self::with_catalog(config, Arc::new(catalog), HookRegistry::new())
    }

    /// Build a service around an existing catalog and hook registry.
    pub fn with_catalog(
        config: OembedConfig,
        catalog: Arc<Catalog>,
        hooks: HookRegistry,
    ) -> Result<Self, ServiceError> {
        let base_url = parse_url("service.base_url", &config.service.base_url)?;
        let public_url = parse_url("files.public_url", &config.files.public_url)?;

        let files = PublicFiles::new(config.files.public_root.clone(), public_url);
        let derivatives = DerivativeGenerator::new(files, config.derivatives.private_key.clone())
            .with_jpeg_quality(config.derivatives.jpeg_quality);
        let renderer = Arc::new(MarkupRenderer::new(
            catalog.clone(),
            catalog.clone(),
            catalog.clone(),
            derivatives.clone(),
            base_url.clone(),
            config.derivatives.private_key.clone(),
        ));

        let engine = ResolutionEngine::new(
            Collaborators::from_catalog(catalog.clone(), renderer),
            derivatives,
            LocatorParser::new(Some(base_url)),
        )
        .with_hooks(hooks);

        let embed_urls = EmbedUrlResolver::new(
            config.service.service_url(),
            config.service.resource_base_url.clone(),
        );

        Ok(Self { catalog, engine: Arc::new(engine), embed_urls, config })
    }

    pub fn config(&self) -> &OembedConfig {
        &self.config
    }

    /// The endpoint controller, checking access with `access`.
    pub fn endpoint(&self, access: Arc<dyn AccessChecker>) -> OembedEndpoint {
        OembedEndpoint::new(self.engine.clone(), access).with_max_age(self.config.cache.max_age)
    }

    /// The caller anonymous server requests run as.
    pub fn server_principal(&self) -> Principal {
        Principal::anonymous(self.config.server.permissions.iter().cloned())
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ServiceError> {
    Url::parse(value).map_err(|source| ServiceError::Url { field, source })
}
