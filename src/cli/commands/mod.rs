//! One module per subcommand.

pub mod archive;
pub mod check;
pub mod create;
pub mod delete;
pub mod init;
pub mod list;
pub mod show;
pub mod sync;
pub mod update;
pub mod version;
pub mod watch;

use anyhow::Result;
use beans_lib::{Bean, BeanStore, LinkType};

use super::CommandError;

/// Resolve every id, failing on the first unknown one.
pub(crate) fn resolve_ids(store: &BeanStore, ids: &[String]) -> Result<Vec<String>> {
    ids.iter()
        .map(|id| store.resolve_id(id).map_err(Into::into))
        .collect()
}

/// Add `bean --link_type--> target` after resolving the target and checking
/// that the edge closes no cycle.
pub(crate) fn link_to(store: &BeanStore, bean: &mut Bean, link_type: LinkType, target: &str) -> Result<()> {
    let target = store.resolve_id(target)?;
    if !bean.id.is_empty() {
        if let Some(cycle) = store.detect_cycle(&bean.id, &link_type, &target)? {
            return Err(CommandError::WouldCycle {
                link_type: link_type.to_string(),
                path: cycle.join(" -> "),
            }
            .into());
        }
    }
    bean.add_link(link_type, target);
    Ok(())
}
