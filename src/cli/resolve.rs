//! Resolve, batch and inspect command implementations

use rayon::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use crate::engine::{Resolution, ResolutionFailure};
use crate::service::OembedService;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the resolve command
pub fn run_resolve(service: &OembedService, locator: &str, with_cache: bool) -> ExitCode {
    match service.engine.resolve(locator) {
        Ok(resolution) => {
            let output = if with_cache {
                json!({ "payload": resolution.payload, "cache": resolution.cache })
            } else {
                Value::Object(resolution.payload)
            };
            print_pretty(&output);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(failure) => {
            eprintln!("Error: {}", failure_message(&failure));
            match failure {
                ResolutionFailure::Parse { .. } => ExitCode::from(EXIT_INVALID_ARGS),
                ResolutionFailure::Resolve(_) => ExitCode::from(EXIT_ERROR),
            }
        }
    }
}

/// Execute the batch command
///
/// Locators are resolved in parallel; output lines keep the input order.
pub fn run_batch(service: &OembedService, input: &Path) -> ExitCode {
    let contents = match read_input(input) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Error: Cannot read '{}': {}", input.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let locators = batch_locators(&contents);
    let results: Vec<(Value, bool)> = locators
        .par_iter()
        .map(|locator| {
            let result = service.engine.resolve(locator);
            let ok = result.is_ok();
            (batch_line(locator, &result), ok)
        })
        .collect();

    let mut failed = 0;
    for (line, ok) in &results {
        println!("{}", line);
        if !ok {
            failed += 1;
        }
    }

    if failed > 0 {
        eprintln!("{} of {} locators failed to resolve", failed, results.len());
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

/// Execute the inspect command
pub fn run_inspect(service: &OembedService, embed_url: &str) -> ExitCode {
    match service.embed_urls.resolve(embed_url) {
        Some(reference) => {
            print_pretty(&json!({
                "uuid": reference.uuid,
                "entity_type": reference.entity_type,
                "view_mode": reference.view_mode,
            }));
            ExitCode::from(EXIT_SUCCESS)
        }
        None => {
            eprintln!(
                "Error: '{}' is not an embed URL of {}",
                embed_url,
                service.config().service.service_url()
            );
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn read_input(input: &Path) -> io::Result<String> {
    if input.as_os_str() == "-" {
        let mut contents = String::new();
        io::stdin().read_to_string(&mut contents)?;
        Ok(contents)
    } else {
        fs::read_to_string(input)
    }
}

/// Non-empty lines that are not `#` comments.
fn batch_locators(contents: &str) -> Vec<&str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

fn batch_line(locator: &str, result: &Result<Resolution, ResolutionFailure>) -> Value {
    match result {
        Ok(resolution) => json!({ "locator": locator, "payload": resolution.payload }),
        Err(failure) => {
            let error = failure.kind().map(|k| k.as_str()).unwrap_or("invalid_locator");
            json!({ "locator": locator, "error": error, "message": failure_message(failure) })
        }
    }
}

fn failure_message(failure: &ResolutionFailure) -> String {
    match failure {
        ResolutionFailure::Parse { error, .. } => error.to_string(),
        ResolutionFailure::Resolve(error) => error.message.clone(),
    }
}

fn print_pretty(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}
