use anyhow::Result;
use beans_lib::{Bean, LinkType};

use super::link_to;
use crate::cli::{CommandContext, CreateArgs};
use crate::format::{BeanWithEtag, format_bean_line, print_json};

/// Execute the create command.
///
/// # Errors
///
/// Returns an error if a field does not parse, a link target is unknown, or
/// the store rejects the bean.
pub fn execute(args: CreateArgs, ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;

    let mut bean = Bean::new(args.title);
    if let Some(id) = args.id {
        bean.id = id;
    }
    if let Some(t) = args.type_ {
        bean.bean_type = t.parse()?;
    }
    if let Some(s) = args.status {
        bean.status = s.parse()?;
    }
    if let Some(p) = args.priority {
        bean.priority = p.parse()?;
    }
    bean.tags = args.tags;
    bean.body = args.body.unwrap_or_default();

    if let Some(parent) = args.parent {
        link_to(&store, &mut bean, LinkType::Parent, &parent)?;
    }
    if let Some(milestone) = args.milestone {
        link_to(&store, &mut bean, LinkType::Milestone, &milestone)?;
    }
    for target in &args.blocks {
        link_to(&store, &mut bean, LinkType::Blocks, target)?;
    }
    for target in &args.related {
        link_to(&store, &mut bean, LinkType::Related, target)?;
    }

    let created = store.create(bean)?;
    if ctx.json {
        return print_json(&BeanWithEtag::new(created)?);
    }
    ctx.say(format!("Created {}", format_bean_line(&created)));
    Ok(())
}
