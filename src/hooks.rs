//! Extension hooks
//!
//! Two extension points are exposed:
//!
//! - **Source contributors** resolve resources whose source kind has no
//!   built-in resolver. They run in priority order; each may pass, provide a
//!   payload (replacing any earlier one), or provide one and stop the chain.
//! - **Payload alters** run after every successful resolution and may rewrite
//!   the payload and add the dependencies they read. Each sees the previous
//!   one's output.
//!
//! Registration happens once at startup. Higher priorities run first and
//! hooks with equal priority run in registration order.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::cache::CacheMetadata;
use crate::models::Resource;

/// A JSON object payload.
pub type Payload = Map<String, Value>;

/// A payload with the dependencies read to produce it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contribution {
    pub payload: Payload,
    pub cache: CacheMetadata,
}

impl Contribution {
    pub fn new(payload: Payload) -> Self {
        Self { payload, cache: CacheMetadata::new() }
    }

    pub fn with_cache(mut self, cache: CacheMetadata) -> Self {
        self.cache = self.cache.merge(&cache);
        self
    }
}

/// Answer of a source contributor.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// Not handled here
    Pass,
    /// Handled; later contributors may still replace it
    Provide(Contribution),
    /// Handled; no further contributors run
    ProvideAndStop(Contribution),
}

/// What a hook gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub resource: &'a Resource,
    pub display_hint: Option<&'a str>,
    /// Query parameters of the locator
    pub query: &'a BTreeMap<String, String>,
}

pub trait SourceContributor: Send + Sync {
    fn contribute(&self, context: &HookContext<'_>) -> SourceOutcome;
}

impl<F> SourceContributor for F
where
    F: Fn(&HookContext<'_>) -> SourceOutcome + Send + Sync,
{
    fn contribute(&self, context: &HookContext<'_>) -> SourceOutcome {
        self(context)
    }
}

/// Post-resolution rewrite. Whatever the hook reads goes into the returned
/// contribution's cache metadata.
pub trait PayloadAlter: Send + Sync {
    fn alter(&self, contribution: Contribution, context: &HookContext<'_>) -> Contribution;
}

impl<F> PayloadAlter for F
where
    F: Fn(Contribution, &HookContext<'_>) -> Contribution + Send + Sync,
{
    fn alter(&self, contribution: Contribution, context: &HookContext<'_>) -> Contribution {
        self(contribution, context)
    }
}

struct Registered<T: ?Sized> {
    name: String,
    priority: i32,
    hook: Box<T>,
}

/// Ordered hook registry.
#[derive(Default)]
pub struct HookRegistry {
    sources: Vec<Registered<dyn SourceContributor>>,
    alters: Vec<Registered<dyn PayloadAlter>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("sources", &self.source_names())
            .field("alters", &self.alter_names())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        contributor: impl SourceContributor + 'static,
    ) -> &mut Self {
        let entry = Registered { name: name.into(), priority, hook: Box::new(contributor) as Box<dyn SourceContributor> };
        insert_ordered(&mut self.sources, entry);
        self
    }

    pub fn register_alter(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        alter: impl PayloadAlter + 'static,
    ) -> &mut Self {
        let entry = Registered { name: name.into(), priority, hook: Box::new(alter) as Box<dyn PayloadAlter> };
        insert_ordered(&mut self.alters, entry);
        self
    }

    /// Source contributor names in run order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Alter hook names in run order.
    pub fn alter_names(&self) -> Vec<&str> {
        self.alters.iter().map(|r| r.name.as_str()).collect()
    }

    /// Run the source chain. `None` when every contributor passed.
    pub fn resolve_source(&self, context: &HookContext<'_>) -> Option<Contribution> {
        let mut provided = None;
        for entry in &self.sources {
            match entry.hook.contribute(context) {
                SourceOutcome::Pass => {}
                SourceOutcome::Provide(contribution) => {
                    debug!(hook = %entry.name, "source provided");
                    provided = Some(contribution);
                }
                SourceOutcome::ProvideAndStop(contribution) => {
                    debug!(hook = %entry.name, "source provided, stopping");
                    return Some(contribution);
                }
            }
        }
        provided
    }

    /// Run every alter hook over the contribution.
    ///
    /// Dependencies are only ever added: a hook that drops tags from the
    /// cache metadata it was handed does not remove them from the result.
    pub fn alter(&self, contribution: Contribution, context: &HookContext<'_>) -> Contribution {
        self.alters.iter().fold(contribution, |current, entry| {
            let cache = current.cache.clone();
            let altered = entry.hook.alter(current, context);
            debug!(hook = %entry.name, "payload altered");
            Contribution { payload: altered.payload, cache: cache.merge(&altered.cache) }
        })
    }
}

/// Insert after every entry with a priority greater than or equal to the new one.
fn insert_ordered<T: ?Sized>(entries: &mut Vec<Registered<T>>, entry: Registered<T>) {
    let index = entries.partition_point(|e| e.priority >= entry.priority);
    entries.insert(index, entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceField, SourceKind, SourceMetadata, SourceValue};
    use serde_json::json;
    use uuid::Uuid;

    fn resource() -> Resource {
        Resource {
            id: 9,
            uuid: Uuid::nil(),
            kind: SourceKind::Other("test".to_string()),
            bundle: "test".to_string(),
            name: "Custom".to_string(),
            language: "en".to_string(),
            published: true,
            source: SourceField { name: "field_media_test".to_string(), value: SourceValue::Inline(json!({"a": 1})) },
            metadata: SourceMetadata::default(),
        }
    }

    fn payload(kind: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("type".to_string(), json!(kind));
        payload
    }

    fn with_context<R>(f: impl FnOnce(&HookContext<'_>) -> R) -> R {
        let resource = resource();
        let query = BTreeMap::new();
        f(&HookContext { resource: &resource, display_hint: None, query: &query })
    }

    #[test]
    fn test_empty_registry_provides_nothing() {
        let registry = HookRegistry::new();
        assert_eq!(with_context(|ctx| registry.resolve_source(ctx)), None);
    }

    #[test]
    fn test_later_provide_replaces_earlier() {
        let mut registry = HookRegistry::new();
        registry
            .register_source("first", 0, |_: &HookContext<'_>| SourceOutcome::Provide(Contribution::new(payload("first"))))
            .register_source("second", 0, |_: &HookContext<'_>| SourceOutcome::Provide(Contribution::new(payload("second"))))
            .register_source("pass", 0, |_: &HookContext<'_>| SourceOutcome::Pass);

        let provided = with_context(|ctx| registry.resolve_source(ctx)).unwrap();
        assert_eq!(provided.payload["type"], "second");
    }

    #[test]
    fn test_provide_and_stop_ends_chain() {
        let mut registry = HookRegistry::new();
        registry
            .register_source("stop", 0, |_: &HookContext<'_>| {
                SourceOutcome::ProvideAndStop(Contribution::new(payload("stop")))
            })
            .register_source("late", 0, |_: &HookContext<'_>| SourceOutcome::Provide(Contribution::new(payload("late"))));

        let provided = with_context(|ctx| registry.resolve_source(ctx)).unwrap();
        assert_eq!(provided.payload["type"], "stop");
    }

    #[test]
    fn test_priority_orders_hooks() {
        let mut registry = HookRegistry::new();
        registry
            .register_source("low", -5, |_: &HookContext<'_>| SourceOutcome::Pass)
            .register_source("high", 10, |_: &HookContext<'_>| SourceOutcome::Pass)
            .register_source("mid-a", 0, |_: &HookContext<'_>| SourceOutcome::Pass)
            .register_source("mid-b", 0, |_: &HookContext<'_>| SourceOutcome::Pass);
        assert_eq!(registry.source_names(), vec!["high", "mid-a", "mid-b", "low"]);
    }

    #[test]
    fn test_high_priority_provide_is_replaced_by_lower() {
        let mut registry = HookRegistry::new();
        registry
            .register_source("low", -1, |_: &HookContext<'_>| SourceOutcome::Provide(Contribution::new(payload("low"))))
            .register_source("high", 1, |_: &HookContext<'_>| SourceOutcome::Provide(Contribution::new(payload("high"))));
        let provided = with_context(|ctx| registry.resolve_source(ctx)).unwrap();
        assert_eq!(provided.payload["type"], "low");
    }

    #[test]
    fn test_alters_chain_outputs() {
        let mut registry = HookRegistry::new();
        registry
            .register_alter("add", 0, |mut c: Contribution, _: &HookContext<'_>| {
                c.payload.insert("count".to_string(), json!(1));
                c
            })
            .register_alter("double", -1, |mut c: Contribution, _: &HookContext<'_>| {
                let count = c.payload.get("count").and_then(Value::as_i64).unwrap_or(0);
                c.payload.insert("count".to_string(), json!(count * 2));
                c
            })
            .register_alter("query", 0, |mut c: Contribution, ctx: &HookContext<'_>| {
                c.payload.insert("mid".to_string(), json!(ctx.resource.id));
                c
            });

        let altered = with_context(|ctx| registry.alter(Contribution::new(payload("photo")), ctx));
        assert_eq!(altered.payload["count"], 2);
        assert_eq!(altered.payload["mid"], 9);
        assert_eq!(registry.alter_names(), vec!["add", "query", "double"]);
    }

    #[test]
    fn test_alters_add_dependencies() {
        let mut registry = HookRegistry::new();
        registry
            .register_alter("author", 0, |c: Contribution, _: &HookContext<'_>| {
                c.with_cache(CacheMetadata::from_tags(["user:3"]))
            })
            .register_alter("forgetful", -1, |c: Contribution, _: &HookContext<'_>| {
                Contribution::new(c.payload)
            });

        let start = Contribution::new(payload("photo")).with_cache(CacheMetadata::from_tags(["media:9"]));
        let altered = with_context(|ctx| registry.alter(start, ctx));
        assert!(altered.cache.has_tag("media:9"));
        assert!(altered.cache.has_tag("user:3"));
    }
}
