//! Plain text (non-ANSI) formatting for terminal output:
//! - Status icons (○ ◐ ✓ ✗ ✎)
//! - Priority labels
//! - Type badges ([bug], [epic], etc.)
//! - Bean lines and detail blocks

use beans_lib::{Bean, BeanType, IncomingLink, LinkReport, Priority, Status};
use std::fmt::Write as _;

/// Status icon characters.
pub mod icons {
    /// Draft - not ready for work.
    pub const DRAFT: &str = "✎";
    /// Todo - available to work (hollow circle).
    pub const TODO: &str = "○";
    /// In progress - active work (half-filled).
    pub const IN_PROGRESS: &str = "◐";
    /// Completed (checkmark).
    pub const COMPLETED: &str = "✓";
    /// Scrapped (X mark).
    pub const SCRAPPED: &str = "✗";
    /// Custom status.
    pub const UNKNOWN: &str = "?";
}

#[must_use]
pub const fn format_status_icon(status: &Status) -> &'static str {
    match status {
        Status::Draft => icons::DRAFT,
        Status::Todo => icons::TODO,
        Status::InProgress => icons::IN_PROGRESS,
        Status::Completed => icons::COMPLETED,
        Status::Scrapped => icons::SCRAPPED,
        Status::Custom(_) => icons::UNKNOWN,
    }
}

/// Short priority label: `!!`, `!`, blank for normal, `-`, `--`.
#[must_use]
pub const fn format_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "!!",
        Priority::High => "!",
        Priority::Normal => "",
        Priority::Low => "-",
        Priority::Deferred => "--",
    }
}

#[must_use]
pub fn format_type_badge(bean_type: &BeanType) -> String {
    format!("[{}]", bean_type.as_str())
}

/// Single-line summary: `{icon} {id} [{type}] {priority} {title} #tags`.
#[must_use]
pub fn format_bean_line(bean: &Bean) -> String {
    let mut line = format!(
        "{} {} {}",
        format_status_icon(&bean.status),
        bean.id,
        format_type_badge(&bean.bean_type),
    );
    let priority = format_priority(bean.priority);
    if !priority.is_empty() {
        line.push(' ');
        line.push_str(priority);
    }
    line.push(' ');
    line.push_str(&bean.title);
    for tag in &bean.tags {
        let _ = write!(line, " #{tag}");
    }
    if bean.is_archived() {
        line.push_str(" (archived)");
    }
    line
}

/// Multi-line detail view used by `show`.
#[must_use]
pub fn format_bean_details(bean: &Bean, etag: &str, incoming: &[IncomingLink]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", bean.id, bean.title);
    let _ = writeln!(
        out,
        "status: {}  type: {}  priority: {}",
        bean.status, bean.bean_type, bean.priority
    );
    if !bean.tags.is_empty() {
        let _ = writeln!(out, "tags: {}", bean.tags.join(", "));
    }
    let _ = writeln!(out, "file: {}", bean.path.display());
    let _ = writeln!(out, "etag: {etag}");
    let _ = writeln!(
        out,
        "created: {}  updated: {}",
        bean.created_at.format("%Y-%m-%d %H:%M"),
        bean.updated_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(branch) = &bean.git_branch {
        let _ = writeln!(out, "branch: {branch}");
    }
    if let Some(commit) = &bean.git_merge_commit {
        let _ = writeln!(out, "merged in: {commit}");
    }

    if !bean.links.is_empty() {
        out.push_str("links:\n");
        for link in &bean.links {
            let _ = writeln!(out, "  {} -> {}", link.link_type, link.target);
        }
    }
    if !incoming.is_empty() {
        out.push_str("linked from:\n");
        for link in incoming {
            let _ = writeln!(out, "  {} ({})", link.from_id, link.link_type);
        }
    }
    if !bean.body.is_empty() {
        out.push('\n');
        out.push_str(&bean.body);
        out.push('\n');
    }
    out
}

/// Human-readable link report, one issue per line.
#[must_use]
pub fn format_link_report(report: &LinkReport) -> String {
    if report.is_clean() {
        return "All links are valid.\n".to_string();
    }
    let mut out = String::new();
    for broken in &report.broken {
        let _ = writeln!(
            out,
            "broken: {} --{}--> {} (target missing)",
            broken.bean_id, broken.link_type, broken.target
        );
    }
    for self_link in &report.self_links {
        let _ = writeln!(
            out,
            "self-link: {} --{}--> itself",
            self_link.bean_id, self_link.link_type
        );
    }
    for cycle in &report.cycles {
        let _ = writeln!(out, "cycle ({}): {}", cycle.link_type, cycle.key);
    }
    out
}
