use anyhow::Result;

use crate::cli::{CommandContext, CommandError, DeleteArgs};
use crate::format::{DeleteOutput, print_json};

/// Execute the delete command.
///
/// A bean that other beans still link to is only deleted with `--force`,
/// which strips those links first.
///
/// # Errors
///
/// Returns an error if the id does not resolve, incoming links exist
/// without `--force`, or the file cannot be removed.
pub fn execute(args: &DeleteArgs, ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_id(&args.id)?;

    let incoming = store.find_incoming_links(&id)?;
    let (bean, links_removed) = if incoming.is_empty() {
        (store.delete(&id)?, 0)
    } else if args.force {
        store.delete_with_links(&id)?
    } else {
        return Err(CommandError::HasIncomingLinks {
            id,
            count: incoming.len(),
        }
        .into());
    };

    if ctx.json {
        return print_json(&DeleteOutput {
            id: bean.id,
            links_removed,
        });
    }
    ctx.say(format!("Deleted {} {}", bean.id, bean.title));
    if links_removed > 0 {
        ctx.say(format!("Removed {links_removed} link(s) pointing at it"));
    }
    Ok(())
}
