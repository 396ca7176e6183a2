//! CLI integration tests for the oembed binary
//!
//! These tests run the binary against a generated site directory
//! (oembed.toml, catalog and public files) and check exit codes and output.

mod common;

use common::{locator, write_source_image, CATALOG, FILE_UUID, IMAGE_UUID, UNKNOWN_UUID};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Get the path to the oembed binary
fn oembed_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_oembed"))
}

/// Lay out a site: oembed.toml, catalog.toml and files/example_1.jpeg
fn make_site() -> TempDir {
    let site = TempDir::new().expect("should create temp dir");
    fs::create_dir_all(site.path().join("files")).expect("should create files dir");
    write_source_image(&site.path().join("files").join("example_1.jpeg"));
    fs::write(site.path().join("catalog.toml"), CATALOG).expect("should write catalog");
    fs::write(
        site.path().join("oembed.toml"),
        r#"
[service]
base_url = "https://example.com"
resource_base_url = "https://example.com/media"

[files]
public_root = "files"
public_url = "https://example.com/files/"

[catalog]
path = "catalog.toml"
"#,
    )
    .expect("should write config");
    site
}

fn run(site: &Path, args: &[&str]) -> Output {
    Command::new(oembed_binary())
        .arg("--config")
        .arg(site.join("oembed.toml"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute oembed")
}

#[test]
fn test_resolve_prints_payload() {
    let site = make_site();
    let output = run(site.path(), &["resolve", &locator(IMAGE_UUID, Some("thumbnail"))]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(payload["type"], "photo");
    assert_eq!(payload["width"], 100);
    assert_eq!(payload["height"], 45);
    assert!(site.path().join("files/styles/thumbnail/public/example_1.jpeg").is_file());
}

#[test]
fn test_resolve_with_cache() {
    let site = make_site();
    let output = run(site.path(), &["resolve", "--cache", &locator(FILE_UUID, None)]);

    assert!(output.status.success());
    let result: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(result["payload"]["type"], "link");
    let tags = result["cache"]["tags"].as_array().expect("tags should be an array");
    assert!(tags.iter().any(|t| t == "file:5"));
}

#[test]
fn test_resolve_failure_exit_codes() {
    let site = make_site();

    let output = run(site.path(), &["resolve", &locator(UNKNOWN_UUID, None)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));

    let output = run(site.path(), &["resolve", "https://example.com/node/1"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_batch_keeps_input_order() {
    let site = make_site();
    let input = site.path().join("locators.txt");
    let lines = [
        locator(IMAGE_UUID, None),
        "# skipped".to_string(),
        locator(UNKNOWN_UUID, None),
        locator(FILE_UUID, None),
    ];
    fs::write(&input, lines.join("\n")).expect("should write input");

    let output = run(site.path(), &["batch", input.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(1));

    let results: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["payload"]["type"], "photo");
    assert_eq!(results[1]["error"], "resource_not_found");
    assert_eq!(results[2]["payload"]["type"], "link");
}

#[test]
fn test_inspect_embed_url() {
    let site = make_site();
    let embed_url = format!(
        "https://example.com/oembed?url=https%3A%2F%2Fexample.com%2Fmedia%2F{}%3Fview_mode%3Dfull",
        IMAGE_UUID
    );
    let output = run(site.path(), &["inspect", &embed_url]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let reference: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(reference["uuid"], IMAGE_UUID);
    assert_eq!(reference["view_mode"], "full");

    let output = run(site.path(), &["inspect", "https://elsewhere.example/oembed?url=x"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_derive_command() {
    let site = make_site();
    let output = run(site.path(), &["derive", "thumbnail", "public://example_1.jpeg"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let derivative: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(derivative["width"], 100);
    assert_eq!(derivative["derived_uri"], "public://styles/thumbnail/public/example_1.jpeg");

    let output = run(site.path(), &["derive", "nonexistent", "public://example_1.jpeg"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_config_exit_code() {
    let site = make_site();
    fs::write(site.path().join("oembed.toml"), "[derivatives]\njpeg_quality = 0\n")
        .expect("should write config");

    let output = run(site.path(), &["resolve", &locator(IMAGE_UUID, None)]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("jpeg_quality"));
}
