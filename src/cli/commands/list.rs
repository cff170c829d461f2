//! List command implementation.
//!
//! Filters the store snapshot; by default archived beans are hidden.

use anyhow::Result;
use beans_lib::{Bean, BeanType, Priority, Status, model::normalize_tag};

use crate::cli::{CommandContext, ListArgs};
use crate::format::{BeanWithEtag, format_bean_line, print_json};

/// Parsed filter set. Empty vectors match everything.
#[derive(Debug, Default)]
pub struct ListFilters {
    pub statuses: Vec<Status>,
    pub types: Vec<BeanType>,
    pub priorities: Vec<Priority>,
    pub tags: Vec<String>,
    pub parent: Option<String>,
    pub include_active: bool,
    pub include_archived: bool,
}

impl ListFilters {
    #[must_use]
    pub fn matches(&self, bean: &Bean) -> bool {
        let archived_ok = if bean.is_archived() {
            self.include_archived
        } else {
            self.include_active
        };
        archived_ok
            && (self.statuses.is_empty() || self.statuses.contains(&bean.status))
            && (self.types.is_empty() || self.types.contains(&bean.bean_type))
            && (self.priorities.is_empty() || self.priorities.contains(&bean.priority))
            && self.tags.iter().all(|t| bean.has_tag(t))
            && self
                .parent
                .as_deref()
                .is_none_or(|parent| bean.parent() == Some(parent))
    }
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or a filter does not parse.
pub fn execute(args: &ListArgs, ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    let mut filters = build_filters(args)?;
    if let Some(parent) = &filters.parent {
        filters.parent = Some(store.resolve_id(parent)?);
    }

    let mut beans: Vec<Bean> = store
        .all()?
        .into_iter()
        .filter(|b| filters.matches(b))
        .collect();
    sort_beans(&mut beans);

    if ctx.json {
        let out = beans
            .into_iter()
            .map(BeanWithEtag::new)
            .collect::<beans_lib::Result<Vec<_>>>()?;
        return print_json(&out);
    }
    if beans.is_empty() {
        ctx.say("No beans found.");
        return Ok(());
    }
    for bean in &beans {
        println!("{}", format_bean_line(bean));
    }
    ctx.say(format!("\n{} bean(s)", beans.len()));
    Ok(())
}

/// Convert CLI args to filters.
fn build_filters(args: &ListArgs) -> Result<ListFilters> {
    Ok(ListFilters {
        statuses: args
            .status
            .iter()
            .map(|s| s.parse())
            .collect::<beans_lib::Result<_>>()?,
        types: args
            .type_
            .iter()
            .map(|t| t.parse())
            .collect::<beans_lib::Result<_>>()?,
        priorities: args
            .priority
            .iter()
            .map(|p| p.parse())
            .collect::<beans_lib::Result<_>>()?,
        tags: args.tags.iter().filter_map(|t| normalize_tag(t)).collect(),
        parent: args.parent.clone(),
        include_active: !args.archived,
        include_archived: args.all || args.archived,
    })
}

/// Active work first, then by priority, then by id.
fn sort_beans(beans: &mut [Bean]) {
    beans.sort_by(|a, b| {
        status_rank(&a.status)
            .cmp(&status_rank(&b.status))
            .then(a.priority.cmp(&b.priority))
            .then_with(|| a.id.cmp(&b.id))
    });
}

const fn status_rank(status: &Status) -> u8 {
    match status {
        Status::InProgress => 0,
        Status::Todo => 1,
        Status::Draft => 2,
        Status::Custom(_) => 3,
        Status::Completed => 4,
        Status::Scrapped => 5,
    }
}
