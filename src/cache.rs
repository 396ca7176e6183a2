//! Cache metadata for resolution results
//!
//! Every object the engine reads contributes a [`CacheMetadata`] value.
//! Values merge by union of tags and contexts and by the minimum max-age, so
//! folding the contributions of a resolution does not depend on the order the
//! steps ran in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::repository::DisplayRepository;

/// Entity type every resolvable resource belongs to.
pub const MEDIA_TARGET_TYPE: &str = "media";

/// Invalidated whenever any media entity is saved or deleted.
pub const MEDIA_LIST_TAG: &str = "media_list";

/// Invalidated when a view mode definition is added or removed.
pub const VIEW_MODE_LIST_TAG: &str = "config:entity_view_mode_list";

/// Invalidated when a display configuration is added or removed.
pub const VIEW_DISPLAY_LIST_TAG: &str = "config:entity_view_display_list";

/// Results vary by the requested resource URL.
pub const URL_CONTEXT: &str = "url";

/// Results vary by the permissions of the caller.
pub const PERMISSIONS_CONTEXT: &str = "user.permissions";

/// How long a result may be reused.
///
/// Serialized the way HTTP caches and the admin tooling expect it: `-1` means
/// permanent, any other value is a number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MaxAge {
    /// Valid until one of the tags is invalidated
    #[default]
    Permanent,
    /// Valid for at most this many seconds
    Seconds(u32),
}

impl MaxAge {
    /// The stricter of two max-ages.
    pub fn min(self, other: MaxAge) -> MaxAge {
        match (self, other) {
            (MaxAge::Permanent, age) | (age, MaxAge::Permanent) => age,
            (MaxAge::Seconds(a), MaxAge::Seconds(b)) => MaxAge::Seconds(a.min(b)),
        }
    }

    /// Number of seconds, or `None` when permanent.
    pub fn as_seconds(self) -> Option<u32> {
        match self {
            MaxAge::Permanent => None,
            MaxAge::Seconds(secs) => Some(secs),
        }
    }
}

impl From<i64> for MaxAge {
    fn from(value: i64) -> Self {
        if value < 0 {
            MaxAge::Permanent
        } else {
            MaxAge::Seconds(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

impl From<MaxAge> for i64 {
    fn from(value: MaxAge) -> Self {
        match value {
            MaxAge::Permanent => -1,
            MaxAge::Seconds(secs) => i64::from(secs),
        }
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAge::Permanent => write!(f, "permanent"),
            MaxAge::Seconds(secs) => write!(f, "{}s", secs),
        }
    }
}

/// Invalidation signals attached to a resolution result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    contexts: BTreeSet<String>,
    #[serde(default)]
    max_age: MaxAge,
}

impl CacheMetadata {
    /// Empty metadata: no tags, no contexts, permanent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying only the given tags.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_tags(tags)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = self.max_age.min(max_age);
        self
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    pub fn max_age(&self) -> MaxAge {
        self.max_age
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.contexts.contains(context)
    }

    /// True when the metadata carries no signal at all.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.contexts.is_empty() && self.max_age == MaxAge::Permanent
    }

    /// Combine two values: union of tags and contexts, minimum max-age.
    ///
    /// Commutative, associative and idempotent.
    pub fn merge(mut self, other: &CacheMetadata) -> CacheMetadata {
        self.tags.extend(other.tags.iter().cloned());
        self.contexts.extend(other.contexts.iter().cloned());
        self.max_age = self.max_age.min(other.max_age);
        self
    }

    /// Merge in the metadata of anything cacheable.
    pub fn add_dependency(self, dependency: &impl Cacheable) -> CacheMetadata {
        self.merge(&dependency.cache_metadata())
    }

    /// Tags as a single space-separated header value.
    pub fn tags_header(&self) -> String {
        self.tags.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl FromIterator<CacheMetadata> for CacheMetadata {
    fn from_iter<T: IntoIterator<Item = CacheMetadata>>(iter: T) -> Self {
        iter.into_iter().fold(CacheMetadata::new(), |acc, item| acc.merge(&item))
    }
}

/// Anything that contributes invalidation signals when read.
pub trait Cacheable {
    fn cache_metadata(&self) -> CacheMetadata;
}

impl Cacheable for CacheMetadata {
    fn cache_metadata(&self) -> CacheMetadata {
        self.clone()
    }
}

/// Dependencies attached to every resolution, successful or not.
///
/// Besides the list tags, this includes the tag of every view mode and display
/// configuration currently defined for media. Deleting or reconfiguring any of
/// them therefore invalidates cached 200 and 404 responses alike.
pub fn baseline(displays: &dyn DisplayRepository) -> CacheMetadata {
    let mut cache = CacheMetadata::from_tags([MEDIA_LIST_TAG, VIEW_MODE_LIST_TAG, VIEW_DISPLAY_LIST_TAG])
        .with_context(URL_CONTEXT);

    for view_mode in displays.view_modes(MEDIA_TARGET_TYPE) {
        cache = cache.add_dependency(&view_mode);
    }
    for display in displays.displays(MEDIA_TARGET_TYPE) {
        cache = cache.add_dependency(&display);
    }

    cache
}
