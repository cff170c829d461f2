//! `beans` - file-backed issue tracker.
//!
//! Issues live as markdown files with YAML front matter in `.beans/`.

use beans::cli::{self, Cli};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    match cli::run(cli) {
        Ok(code) => code,
        Err(err) => {
            cli::report_error(&err, json);
            ExitCode::FAILURE
        }
    }
}
