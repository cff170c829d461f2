use anyhow::Result;

use crate::cli::CommandContext;
use crate::format::{BeanWithEtag, format_bean_line, print_json};

/// Execute the sync command.
///
/// Git flow is switched on for this run even when the config leaves it off.
///
/// # Errors
///
/// Returns an error if no repository contains the store or git fails.
pub fn execute(ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    if !store.is_gitflow_enabled() {
        store.enable_gitflow(&ctx.resolved.project_dir)?;
    }

    let changed = store.sync_gitflow()?;
    if ctx.json {
        let out = changed
            .into_iter()
            .map(BeanWithEtag::new)
            .collect::<beans_lib::Result<Vec<_>>>()?;
        return print_json(&out);
    }
    if changed.is_empty() {
        ctx.say("No branch changes.");
    }
    for bean in &changed {
        ctx.say(format_bean_line(bean));
    }
    Ok(())
}
