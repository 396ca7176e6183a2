//! oembed-resolver - Library for answering oEmbed requests about locally hosted resources
//!
//! This library provides functionality to:
//! - Parse resource URLs and stored embed URLs into resource identifiers
//! - Resolve resources into oEmbed payloads by their kind and display mode
//! - Generate image style derivatives on demand
//! - Aggregate cache tags, contexts and max-age for every outcome
//! - Extend resolution through an ordered hook registry

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod derivative;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod files;
pub mod hooks;
pub mod locator;
pub mod logging;
pub mod models;
pub mod render;
pub mod repository;
pub mod resolver;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
