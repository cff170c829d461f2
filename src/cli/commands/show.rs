//! Show command implementation.

use anyhow::Result;

use crate::cli::CommandContext;
use crate::format::{BeanDetails, format_bean_details, print_json};

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or an id does not resolve.
pub fn execute(ids: &[String], ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;

    let mut details = Vec::with_capacity(ids.len());
    for id in ids {
        let bean = store.get(id)?;
        let incoming = store.find_incoming_links(&bean.id)?;
        let etag = bean.etag()?;
        details.push(BeanDetails {
            bean,
            etag,
            incoming,
        });
    }

    if ctx.json {
        return print_json(&details);
    }
    for (i, detail) in details.iter().enumerate() {
        if i > 0 {
            println!("----------------------------------------");
        }
        print!(
            "{}",
            format_bean_details(&detail.bean, &detail.etag, &detail.incoming)
        );
    }
    Ok(())
}
