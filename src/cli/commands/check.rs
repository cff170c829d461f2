use anyhow::Result;

use crate::cli::{CheckArgs, CommandContext, CommandError};
use crate::format::{CheckOutput, format_link_report, print_json};

/// Execute the check command.
///
/// Reports broken links, self links and cycles. With `--fix` the repairable
/// ones are removed first. Cycles always need a human decision.
///
/// # Errors
///
/// Returns `LinkIssues` when problems remain after the run.
pub fn execute(args: &CheckArgs, ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    let fixed = if args.fix { store.fix_broken_links()? } else { 0 };
    let report = store.check_all_links()?;
    let remaining = report.broken.len() + report.self_links.len() + report.cycles.len();

    if ctx.json {
        print_json(&CheckOutput {
            clean: report.is_clean(),
            report,
            fixed,
        })?;
    } else {
        if fixed > 0 {
            ctx.say(format!("Removed {fixed} broken link(s)."));
        }
        print!("{}", format_link_report(&report));
    }

    if remaining > 0 {
        return Err(CommandError::LinkIssues { count: remaining }.into());
    }
    Ok(())
}
