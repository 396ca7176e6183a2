//! Serve command implementation

use std::process::ExitCode;
use std::sync::Arc;

use crate::repository::PermissionAccessChecker;
use crate::server;
use crate::service::OembedService;

use super::{EXIT_ERROR, EXIT_SUCCESS};

/// Execute the serve command
pub fn run_serve(service: &OembedService) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to start runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let config = service.config();
    let endpoint = Arc::new(service.endpoint(Arc::new(PermissionAccessChecker)));
    let served = runtime.block_on(server::serve(
        endpoint,
        service.server_principal(),
        &config.server.host,
        config.server.port,
        &config.service.endpoint_path,
    ));

    match served {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
