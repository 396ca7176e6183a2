//! In-memory catalog of resources, files, displays and styles
//!
//! The catalog implements every storage collaborator trait. It is loaded from
//! a TOML file for the CLI and server, and built programmatically in tests.
//! Mutations go through a lock so a shared catalog can be edited while the
//! engine keeps resolving against it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    display_id, Component, DisplayConfiguration, FileId, FileRecord, ImageStyle, Resource,
    ResourceId, ResponsiveImageStyle, ViewMode,
};
use crate::repository::{DisplayRepository, FileRepository, ResourceRepository, StyleRepository};

/// Error loading a catalog
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Duplicate {kind} '{id}' in catalog")]
    Duplicate { kind: &'static str, id: String },
}

/// Serialized form of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub view_modes: Vec<ViewMode>,
    #[serde(default)]
    pub displays: Vec<DisplayConfiguration>,
    #[serde(default)]
    pub image_styles: Vec<ImageStyle>,
    #[serde(default)]
    pub responsive_image_styles: Vec<ResponsiveImageStyle>,
}

impl CatalogData {
    fn check_duplicates(&self) -> Result<(), CatalogError> {
        fn first_duplicate<I: Iterator<Item = String>>(ids: I) -> Option<String> {
            let mut seen = std::collections::HashSet::new();
            ids.into_iter().find(|id| !seen.insert(id.clone()))
        }

        let checks: [(&'static str, Option<String>); 5] = [
            ("resource", first_duplicate(self.resources.iter().map(|r| r.uuid.to_string()))),
            ("file", first_duplicate(self.files.iter().map(|f| f.id.to_string()))),
            ("display", first_duplicate(self.displays.iter().map(|d| d.id()))),
            ("image style", first_duplicate(self.image_styles.iter().map(|s| s.id.clone()))),
            (
                "responsive image style",
                first_duplicate(self.responsive_image_styles.iter().map(|s| s.id.clone())),
            ),
        ];
        for (kind, duplicate) in checks {
            if let Some(id) = duplicate {
                return Err(CatalogError::Duplicate { kind, id });
            }
        }
        Ok(())
    }
}

/// Thread-safe catalog.
#[derive(Debug, Default)]
pub struct Catalog {
    data: RwLock<CatalogData>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: CatalogData) -> Result<Self, CatalogError> {
        data.check_duplicates()?;
        Ok(Self { data: RwLock::new(data) })
    }

    pub fn from_toml(contents: &str) -> Result<Self, CatalogError> {
        Self::from_data(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> CatalogData {
        self.data.read().clone()
    }

    pub fn insert_resource(&self, resource: Resource) {
        let mut data = self.data.write();
        data.resources.retain(|r| r.uuid != resource.uuid);
        data.resources.push(resource);
    }

    pub fn delete_resource(&self, id: ResourceId) -> bool {
        let mut data = self.data.write();
        let before = data.resources.len();
        data.resources.retain(|r| r.id != id);
        data.resources.len() != before
    }

    pub fn insert_file(&self, file: FileRecord) {
        let mut data = self.data.write();
        data.files.retain(|f| f.id != file.id);
        data.files.push(file);
    }

    pub fn delete_file(&self, id: FileId) -> bool {
        let mut data = self.data.write();
        let before = data.files.len();
        data.files.retain(|f| f.id != id);
        data.files.len() != before
    }

    pub fn insert_view_mode(&self, view_mode: ViewMode) {
        let mut data = self.data.write();
        data.view_modes
            .retain(|m| !(m.id == view_mode.id && m.target_type == view_mode.target_type));
        data.view_modes.push(view_mode);
    }

    pub fn insert_display(&self, display: DisplayConfiguration) {
        let mut data = self.data.write();
        let id = display.id();
        data.displays.retain(|d| d.id() != id);
        data.displays.push(display);
    }

    pub fn delete_display(&self, target_type: &str, bundle: &str, mode: &str) -> bool {
        let id = display_id(target_type, bundle, mode);
        let mut data = self.data.write();
        let before = data.displays.len();
        data.displays.retain(|d| d.id() != id);
        data.displays.len() != before
    }

    /// Remove one field's component from a display. Returns the removed one.
    pub fn remove_component(
        &self,
        target_type: &str,
        bundle: &str,
        mode: &str,
        field: &str,
    ) -> Option<Component> {
        let id = display_id(target_type, bundle, mode);
        let mut data = self.data.write();
        data.displays.iter_mut().find(|d| d.id() == id)?.components.remove(field)
    }

    pub fn insert_image_style(&self, style: ImageStyle) {
        let mut data = self.data.write();
        data.image_styles.retain(|s| s.id != style.id);
        data.image_styles.push(style);
    }

    pub fn delete_image_style(&self, id: &str) -> bool {
        let mut data = self.data.write();
        let before = data.image_styles.len();
        data.image_styles.retain(|s| s.id != id);
        data.image_styles.len() != before
    }

    pub fn insert_responsive_image_style(&self, style: ResponsiveImageStyle) {
        let mut data = self.data.write();
        data.responsive_image_styles.retain(|s| s.id != style.id);
        data.responsive_image_styles.push(style);
    }
}

impl ResourceRepository for Catalog {
    fn load_by_uuid(&self, uuid: &Uuid) -> Option<Resource> {
        self.data.read().resources.iter().find(|r| &r.uuid == uuid).cloned()
    }
}

impl FileRepository for Catalog {
    fn load(&self, id: FileId) -> Option<FileRecord> {
        self.data.read().files.iter().find(|f| f.id == id).cloned()
    }
}

impl DisplayRepository for Catalog {
    fn load_display(
        &self,
        target_type: &str,
        bundle: &str,
        mode: &str,
    ) -> Option<DisplayConfiguration> {
        self.data
            .read()
            .displays
            .iter()
            .find(|d| d.target_type == target_type && d.bundle == bundle && d.mode == mode)
            .cloned()
    }

    fn view_modes(&self, target_type: &str) -> Vec<ViewMode> {
        self.data.read().view_modes.iter().filter(|m| m.target_type == target_type).cloned().collect()
    }

    fn displays(&self, target_type: &str) -> Vec<DisplayConfiguration> {
        self.data.read().displays.iter().filter(|d| d.target_type == target_type).cloned().collect()
    }
}

impl StyleRepository for Catalog {
    fn image_style(&self, id: &str) -> Option<ImageStyle> {
        self.data.read().image_styles.iter().find(|s| s.id == id).cloned()
    }

    fn responsive_image_style(&self, id: &str) -> Option<ResponsiveImageStyle> {
        self.data.read().responsive_image_styles.iter().find(|s| s.id == id).cloned()
    }
}
