//! Version command implementation.

use anyhow::Result;
use serde::Serialize;

use crate::cli::VersionArgs;
use crate::format::print_json;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    library: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(args: &VersionArgs, json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    if args.short {
        println!("{version}");
        return Ok(());
    }

    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    if json {
        return print_json(&VersionOutput {
            version,
            build,
            library: "beans-lib",
        });
    }
    println!("beans {version} ({build})");
    Ok(())
}
