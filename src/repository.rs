//! Collaborator interfaces the engine resolves against
//!
//! Storage, access control and markup rendering live outside the engine. The
//! engine only sees these traits; [`crate::catalog::Catalog`] implements the
//! storage ones for the CLI and the tests.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{
    DisplayConfiguration, FileId, FileRecord, ImageStyle, Resource, ResponsiveImageStyle, ViewMode,
};

pub use crate::render::{RenderError, Rendered, Renderer};

/// Looks up resources by their public identifier.
pub trait ResourceRepository: Send + Sync {
    fn load_by_uuid(&self, uuid: &Uuid) -> Option<Resource>;
}

/// Looks up stored files.
pub trait FileRepository: Send + Sync {
    fn load(&self, id: FileId) -> Option<FileRecord>;
}

/// Display mode definitions and their per-bundle configuration.
pub trait DisplayRepository: Send + Sync {
    /// Configuration for one `(target type, bundle, mode)` triple.
    fn load_display(&self, target_type: &str, bundle: &str, mode: &str)
        -> Option<DisplayConfiguration>;

    /// Every view mode defined for a target type.
    fn view_modes(&self, target_type: &str) -> Vec<ViewMode>;

    /// Every display configuration defined for a target type.
    fn displays(&self, target_type: &str) -> Vec<DisplayConfiguration>;
}

/// Image style and responsive image style definitions.
pub trait StyleRepository: Send + Sync {
    fn image_style(&self, id: &str) -> Option<ImageStyle>;
    fn responsive_image_style(&self, id: &str) -> Option<ResponsiveImageStyle>;
}

/// The caller a request is evaluated for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub id: u64,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Caller with no account and the given permissions.
    pub fn anonymous<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { id: 0, permissions: permissions.into_iter().map(Into::into).collect() }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

pub const VIEW_MEDIA: &str = "view media";
pub const VIEW_UNPUBLISHED_MEDIA: &str = "view any unpublished media";

/// Decides whether a principal may see a resource.
pub trait AccessChecker: Send + Sync {
    fn can_view(&self, resource: &Resource, principal: &Principal) -> bool;
}

/// Permission based access: published resources need `view media`,
/// unpublished ones `view any unpublished media`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionAccessChecker;

impl AccessChecker for PermissionAccessChecker {
    fn can_view(&self, resource: &Resource, principal: &Principal) -> bool {
        if resource.published {
            principal.has_permission(VIEW_MEDIA)
        } else {
            principal.has_permission(VIEW_UNPUBLISHED_MEDIA)
        }
    }
}

/// Grants everything. Used by the CLI, which runs as the site owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessChecker for AllowAll {
    fn can_view(&self, _resource: &Resource, _principal: &Principal) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceField, SourceKind, SourceMetadata, SourceValue};

    fn resource(published: bool) -> Resource {
        Resource {
            id: 1,
            uuid: Uuid::nil(),
            kind: SourceKind::Image,
            bundle: "image".to_string(),
            name: "Test".to_string(),
            language: "en".to_string(),
            published,
            source: SourceField { name: "field_media_image".to_string(), value: SourceValue::File(1) },
            metadata: SourceMetadata::default(),
        }
    }

    #[test]
    fn test_published_requires_view_media() {
        let checker = PermissionAccessChecker;
        assert!(checker.can_view(&resource(true), &Principal::anonymous([VIEW_MEDIA])));
        assert!(!checker.can_view(&resource(true), &Principal::anonymous(Vec::<String>::new())));
    }

    #[test]
    fn test_unpublished_requires_unpublished_permission() {
        let checker = PermissionAccessChecker;
        assert!(!checker.can_view(&resource(false), &Principal::anonymous([VIEW_MEDIA])));
        assert!(checker.can_view(&resource(false), &Principal::anonymous([VIEW_UNPUBLISHED_MEDIA])));
    }
}
