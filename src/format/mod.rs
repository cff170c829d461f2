//! Output formatting for `beans`.
//!
//! Supports human-readable text output and machine-parseable JSON. With
//! `--json` the command result goes to stdout as JSON and diagnostics stay
//! on stderr.

mod output;
mod text;

pub use output::{BeanDetails, BeanWithEtag, CheckOutput, DeleteOutput, WatchLine};
pub use text::{
    format_bean_details, format_bean_line, format_link_report, format_priority,
    format_status_icon, format_type_badge,
};

use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
