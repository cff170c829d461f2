use anyhow::Result;
use beans_lib::{Bean, BeanStore, LinkType};

use super::link_to;
use crate::cli::{CommandContext, UpdateArgs};
use crate::format::{BeanWithEtag, format_bean_line, print_json};

/// Execute the update command.
///
/// Applies the flags to the stored bean and writes it back, guarded by
/// `--if-match` when given.
///
/// # Errors
///
/// Returns an error on unknown ids, unparsable fields, cycles, ETag
/// conflicts, or a git flow failure.
pub fn execute(args: UpdateArgs, ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    let mut bean = store.get(&args.id)?;
    let if_match = args.if_match.clone();

    apply(&store, &mut bean, args)?;

    let updated = store.update(bean, if_match.as_deref())?;
    if ctx.json {
        return print_json(&BeanWithEtag::new(updated)?);
    }
    ctx.say(format!("Updated {}", format_bean_line(&updated)));
    if let Some(branch) = &updated.git_branch {
        ctx.say(format!("Branch: {branch}"));
    }
    Ok(())
}

fn apply(store: &BeanStore, bean: &mut Bean, args: UpdateArgs) -> Result<()> {
    if let Some(title) = args.title {
        bean.title = title;
    }
    if let Some(s) = args.status {
        bean.status = s.parse()?;
    }
    if let Some(t) = args.type_ {
        bean.bean_type = t.parse()?;
    }
    if let Some(p) = args.priority {
        bean.priority = p.parse()?;
    }
    if let Some(body) = args.body {
        bean.body = body;
    }
    for tag in &args.add_tags {
        bean.add_tag(tag);
    }
    for tag in &args.remove_tags {
        bean.remove_tag(tag);
    }

    if args.no_parent {
        bean.set_link(LinkType::Parent, None);
    }
    if let Some(parent) = args.parent {
        link_to(store, bean, LinkType::Parent, &parent)?;
    }
    if args.no_milestone {
        bean.set_link(LinkType::Milestone, None);
    }
    if let Some(milestone) = args.milestone {
        link_to(store, bean, LinkType::Milestone, &milestone)?;
    }

    for target in &args.unblock {
        let target = store.resolve_id(target).unwrap_or_else(|_| target.to_lowercase());
        bean.remove_link(&LinkType::Blocks, &target);
    }
    for target in &args.blocks {
        link_to(store, bean, LinkType::Blocks, target)?;
    }
    for target in &args.unrelate {
        let target = store.resolve_id(target).unwrap_or_else(|_| target.to_lowercase());
        bean.remove_link(&LinkType::Related, &target);
    }
    for target in &args.related {
        link_to(store, bean, LinkType::Related, target)?;
    }
    Ok(())
}
