//! Derive command implementation

use std::process::ExitCode;

use crate::derivative::DerivativeError;
use crate::models::Derivative;
use crate::repository::StyleRepository;
use crate::service::OembedService;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the derive command
pub fn run_derive(service: &OembedService, style_id: &str, uri: &str, responsive: bool) -> ExitCode {
    match derive(service, style_id, uri, responsive) {
        Ok(derivative) => match serde_json::to_string_pretty(&derivative) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        },
        Err(DeriveFailure::UnknownStyle(message)) => {
            eprintln!("Error: {}", message);
            ExitCode::from(EXIT_INVALID_ARGS)
        }
        Err(DeriveFailure::Derivative(e)) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[derive(Debug)]
enum DeriveFailure {
    UnknownStyle(String),
    Derivative(DerivativeError),
}

impl From<DerivativeError> for DeriveFailure {
    fn from(e: DerivativeError) -> Self {
        DeriveFailure::Derivative(e)
    }
}

fn derive(
    service: &OembedService,
    style_id: &str,
    uri: &str,
    responsive: bool,
) -> Result<Derivative, DeriveFailure> {
    let catalog = service.catalog.as_ref();
    let derivatives = service.engine.derivatives();

    if !responsive {
        let style = catalog
            .image_style(style_id)
            .ok_or_else(|| DeriveFailure::UnknownStyle(format!("Unknown image style '{}'", style_id)))?;
        return Ok(derivatives.ensure(&style, uri)?);
    }

    let responsive_style = catalog.responsive_image_style(style_id).ok_or_else(|| {
        DeriveFailure::UnknownStyle(format!("Unknown responsive image style '{}'", style_id))
    })?;
    let fallback = catalog.image_style(&responsive_style.fallback_image_style).ok_or_else(|| {
        DeriveFailure::UnknownStyle(format!(
            "Responsive image style '{}' falls back to unknown image style '{}'",
            style_id, responsive_style.fallback_image_style
        ))
    })?;
    Ok(derivatives.ensure_responsive(&responsive_style, &fallback, uri)?)
}
