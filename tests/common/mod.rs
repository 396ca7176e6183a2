//! Shared fixture for the integration tests
//!
//! A temporary public files directory holding a generated 200x89 JPEG, and a
//! catalog with one image, one remote video and one document resource.

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use oembed_resolver::catalog::Catalog;
use oembed_resolver::config::OembedConfig;
use oembed_resolver::hooks::HookRegistry;
use oembed_resolver::service::OembedService;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const BASE_URL: &str = "https://example.com";
pub const PUBLIC_URL: &str = "https://example.com/files/";

pub const IMAGE_UUID: &str = "7c3a9f8e-1d2b-4c5a-9e8f-0a1b2c3d4e5f";
pub const VIDEO_UUID: &str = "0b7a9d61-8c1e-4f3a-a5b2-6d4e8f9a0c1b";
pub const FILE_UUID: &str = "5a2f4b9c-3e1d-4c7b-8a6f-1b2c3d4e5f60";
pub const UNKNOWN_UUID: &str = "00000000-0000-4000-8000-000000000000";

pub const CATALOG: &str = r#"
[[resources]]
id = 1
uuid = "7c3a9f8e-1d2b-4c5a-9e8f-0a1b2c3d4e5f"
kind = "image"
bundle = "image"
name = "Europe"
source = { name = "field_media_image", value = { file = 3 } }
metadata = { width = 200, height = 89 }

[[resources]]
id = 2
uuid = "0b7a9d61-8c1e-4f3a-a5b2-6d4e8f9a0c1b"
kind = "oembed:video"
bundle = "remote_video"
name = "Launch"
source = { name = "field_media_oembed_video", value = { remote_url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ" } }

[[resources]]
id = 4
uuid = "5a2f4b9c-3e1d-4c7b-8a6f-1b2c3d4e5f60"
kind = "file"
bundle = "document"
name = "Report"
source = { name = "field_media_file", value = { file = 5 } }

[[files]]
id = 3
uri = "public://example_1.jpeg"
filename = "example_1.jpeg"
mime = "image/jpeg"
size = 1024

[[files]]
id = 5
uri = "public://report.pdf"
filename = "report.pdf"
mime = "application/pdf"
size = 2048

[[view_modes]]
id = "default"
label = "Default"

[[view_modes]]
id = "thumbnail"
label = "Thumbnail"

[[view_modes]]
id = "large"
label = "Large"

[[view_modes]]
id = "full"
label = "Full"

[[view_modes]]
id = "responsive"
label = "Responsive"

[[view_modes]]
id = "missing_source"
label = "Without source"

[[displays]]
bundle = "image"
mode = "thumbnail"
components.field_media_image = { type = "image", image_style = "thumbnail" }

[[displays]]
bundle = "image"
mode = "large"
components.field_media_image = { type = "image", image_style = "large" }

[[displays]]
bundle = "image"
mode = "full"
components.field_media_image = { type = "image" }

[[displays]]
bundle = "image"
mode = "responsive"
components.field_media_image = { type = "responsive_image", responsive_image_style = "wide" }

[[displays]]
bundle = "image"
mode = "missing_source"
components.name = { type = "string" }

[[displays]]
bundle = "remote_video"
mode = "default"
components.field_media_oembed_video = { type = "oembed_video", max_width = 400, max_height = 250 }

[[displays]]
bundle = "document"
mode = "default"
components.field_media_file = { type = "file_link" }

[[image_styles]]
id = "thumbnail"
label = "Thumbnail (100x100)"
effects = [{ id = "image_scale", width = 100, height = 100 }]

[[image_styles]]
id = "large"
label = "Large (480x480)"
effects = [{ id = "image_scale", width = 480, height = 480 }]

[[responsive_image_styles]]
id = "wide"
label = "Wide"
fallback_image_style = "thumbnail"
breakpoints = [
    { media = "all and (min-width: 851px)", image_style = "large" },
    { media = "all and (min-width: 560px)", image_style = "thumbnail" },
]
"#;

/// A service over the fixture catalog and its public files directory.
pub struct Fixture {
    pub dir: TempDir,
    pub service: OembedService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_hooks(HookRegistry::new())
    }

    pub fn with_hooks(hooks: HookRegistry) -> Self {
        let dir = TempDir::new().expect("should create temp dir");
        write_source_image(&dir.path().join("example_1.jpeg"));

        let catalog = Arc::new(Catalog::from_toml(CATALOG).expect("catalog should parse"));
        let service = OembedService::with_catalog(config(dir.path()), catalog, hooks)
            .expect("service should build");
        Self { dir, service }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.service.catalog
    }

    pub fn public_root(&self) -> &Path {
        self.dir.path()
    }
}

/// Configuration pointing at `public_root`.
pub fn config(public_root: &Path) -> OembedConfig {
    let mut config = OembedConfig::default();
    config.service.base_url = BASE_URL.to_string();
    config.service.resource_base_url = format!("{}/media", BASE_URL);
    config.files.public_root = public_root.to_path_buf();
    config.files.public_url = PUBLIC_URL.to_string();
    config.derivatives.private_key = "fixture-key".to_string();
    config
}

/// Resource URL for `uuid`, optionally with a view mode.
pub fn locator(uuid: &str, view_mode: Option<&str>) -> String {
    match view_mode {
        Some(mode) => format!("{}/media/{}?view_mode={}", BASE_URL, uuid, mode),
        None => format!("{}/media/{}", BASE_URL, uuid),
    }
}

/// Write a 200x89 gradient JPEG.
pub fn write_source_image(path: &Path) {
    let image = RgbImage::from_fn(200, 89, |x, y| Rgb([x as u8, y as u8, 128]));
    image.save_with_format(path, ImageFormat::Jpeg).expect("should write source image");
}
