use anyhow::Result;

use super::resolve_ids;
use crate::cli::{ArchiveArgs, CommandContext};
use crate::format::print_json;

/// Execute the archive command.
///
/// # Errors
///
/// Returns an error if an id does not resolve or a file cannot be moved.
pub fn execute(args: &ArchiveArgs, ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;

    let ids = if args.eligible {
        store.archive_eligible()?
    } else {
        let ids = resolve_ids(&store, &args.ids)?;
        for id in &ids {
            store.archive(id)?;
        }
        ids
    };

    if ctx.json {
        return print_json(&ids);
    }
    if ids.is_empty() {
        ctx.say("Nothing to archive.");
    }
    for id in &ids {
        ctx.say(format!("Archived {id}"));
    }
    Ok(())
}

/// Execute the unarchive command.
///
/// # Errors
///
/// Returns an error if an id does not resolve or a file cannot be moved.
pub fn execute_unarchive(ids: &[String], ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    let ids = resolve_ids(&store, ids)?;
    for id in &ids {
        store.unarchive(id)?;
    }

    if ctx.json {
        return print_json(&ids);
    }
    for id in &ids {
        ctx.say(format!("Restored {id}"));
    }
    Ok(())
}
