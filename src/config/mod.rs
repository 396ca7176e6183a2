//! Configuration module for the resolver
//!
//! Provides types, discovery and loading for `oembed.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
