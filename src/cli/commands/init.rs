use anyhow::Result;
use beans_lib::BeanStore;
use serde::Serialize;
use tracing::info;

use crate::cli::{CommandContext, InitArgs};

#[derive(Serialize)]
struct InitOutput {
    root: String,
    config: String,
    config_written: bool,
}

/// Execute the init command.
///
/// Writes `.beans.yml` when none exists yet, then creates the store
/// directory and its `archive/` subdirectory. Running it again is harmless.
///
/// # Errors
///
/// Returns an error if the config or directories cannot be written.
pub fn execute(args: &InitArgs, ctx: &CommandContext) -> Result<()> {
    let resolved = &ctx.resolved;
    let config_file = resolved.config_file();

    let mut config_written = false;
    if resolved.config_path.is_none() {
        let mut config = resolved.config.clone();
        config.gitflow.enabled |= args.gitflow;
        config.save(&config_file)?;
        config_written = true;
        info!(path = %config_file.display(), "wrote config");
    }

    let root = resolved.store_root();
    BeanStore::init(&root, resolved.config.clone())?;

    if ctx.json {
        return crate::format::print_json(&InitOutput {
            root: root.display().to_string(),
            config: config_file.display().to_string(),
            config_written,
        });
    }
    ctx.say(format!("Initialized beans store in {}", root.display()));
    if config_written {
        ctx.say(format!("Wrote {}", config_file.display()));
    }
    Ok(())
}
