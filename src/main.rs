//! oembed - Command-line tool for resolving resource URLs into oEmbed payloads

use std::process::ExitCode;

use oembed_resolver::cli;

fn main() -> ExitCode {
    cli::run()
}
