//! Command-line interface for `beans`.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;

use anyhow::{Context, Result};
use beans_lib::{BeanStore, BeansError};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{self, CliOverrides, ResolvedConfig};
use crate::logging;

/// `beans` - file-backed issue tracker.
#[derive(Parser, Debug)]
#[command(name = "beans")]
#[command(
    author,
    version,
    about = "File-backed issue tracker (markdown + YAML front matter)",
    long_about = None,
    after_help = "Issues live in .beans/ as one markdown file each; edit them by hand or through this tool."
)]
pub struct Cli {
    /// Output format: text (default) or json
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write JSON logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Store directory (overrides BEANS_PATH and .beans.yml)
    #[arg(long, global = true, value_name = "DIR")]
    pub beans_dir: Option<PathBuf>,

    /// Id prefix (overrides BEANS_PREFIX and .beans.yml)
    #[arg(long, global = true, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a beans store and write .beans.yml
    Init(InitArgs),

    /// Create a new bean
    Create(CreateArgs),

    /// List beans
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show bean details
    Show(ShowArgs),

    /// Update an existing bean
    Update(UpdateArgs),

    /// Move beans into archive/
    Archive(ArchiveArgs),

    /// Move archived beans back
    Unarchive(IdsArgs),

    /// Delete a bean
    #[command(alias = "rm")]
    Delete(DeleteArgs),

    /// Check link integrity
    Check(CheckArgs),

    /// Settle beans whose git branches were merged or deleted
    Sync,

    /// Stream changes made to bean files
    Watch(WatchArgs),

    /// Show version information
    Version(VersionArgs),
}

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Enable git flow in the written config
    #[arg(long)]
    pub gitflow: bool,
}

#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Title of the new bean
    pub title: String,

    /// Explicit id (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Type: milestone, epic, feature, bug, task or custom
    #[arg(short = 't', long = "type")]
    pub type_: Option<String>,

    /// Status (default todo)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Priority: critical, high, normal, low, deferred
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Markdown body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Parent bean
    #[arg(long)]
    pub parent: Option<String>,

    /// Milestone bean
    #[arg(long)]
    pub milestone: Option<String>,

    /// Bean this one blocks (repeatable)
    #[arg(long)]
    pub blocks: Vec<String>,

    /// Related bean (repeatable)
    #[arg(long)]
    pub related: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Filter by status (repeatable)
    #[arg(short, long)]
    pub status: Vec<String>,

    /// Filter by type (repeatable)
    #[arg(short = 't', long = "type")]
    pub type_: Vec<String>,

    /// Filter by tag (repeatable, all must match)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Filter by priority (repeatable)
    #[arg(short, long)]
    pub priority: Vec<String>,

    /// Only beans whose parent is this id
    #[arg(long)]
    pub parent: Option<String>,

    /// Include archived beans
    #[arg(short, long)]
    pub all: bool,

    /// Only archived beans
    #[arg(long, conflicts_with = "all")]
    pub archived: bool,
}

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Bean ids (full or short)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct UpdateArgs {
    /// Bean id (full or short)
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub status: Option<String>,

    #[arg(short = 't', long = "type")]
    pub type_: Option<String>,

    #[arg(short, long)]
    pub priority: Option<String>,

    /// Replace the body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Add a tag (repeatable)
    #[arg(long = "tag")]
    pub add_tags: Vec<String>,

    /// Remove a tag (repeatable)
    #[arg(long = "untag")]
    pub remove_tags: Vec<String>,

    /// Set the parent
    #[arg(long, conflicts_with = "no_parent")]
    pub parent: Option<String>,

    /// Clear the parent
    #[arg(long)]
    pub no_parent: bool,

    /// Set the milestone
    #[arg(long, conflicts_with = "no_milestone")]
    pub milestone: Option<String>,

    /// Clear the milestone
    #[arg(long)]
    pub no_milestone: bool,

    /// Add a blocks edge (repeatable)
    #[arg(long)]
    pub blocks: Vec<String>,

    /// Remove a blocks edge (repeatable)
    #[arg(long)]
    pub unblock: Vec<String>,

    /// Add a related edge (repeatable)
    #[arg(long)]
    pub related: Vec<String>,

    /// Remove a related edge (repeatable)
    #[arg(long)]
    pub unrelate: Vec<String>,

    /// Only write if the stored ETag still matches
    #[arg(long, value_name = "ETAG")]
    pub if_match: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct IdsArgs {
    /// Bean ids (full or short)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ArchiveArgs {
    /// Bean ids (full or short)
    #[arg(required_unless_present = "eligible")]
    pub ids: Vec<String>,

    /// Archive every bean whose status is in archive_statuses
    #[arg(long, conflicts_with = "ids")]
    pub eligible: bool,
}

#[derive(Args, Debug, Default)]
pub struct DeleteArgs {
    /// Bean id (full or short)
    pub id: String,

    /// Also strip links pointing at the bean
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Remove broken and self links
    #[arg(long)]
    pub fix: bool,
}

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Stop after this many seconds (runs until interrupted otherwise)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stop after this many change batches
    #[arg(long, value_name = "N")]
    pub max_batches: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Print only the version number
    #[arg(long)]
    pub short: bool,
}

/// Failures raised by the CLI itself rather than the store.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{id} is linked from {count} bean(s); pass --force to strip those links")]
    HasIncomingLinks { id: String, count: usize },

    #[error("adding {link_type} link would create a cycle: {path}")]
    WouldCycle { link_type: String, path: String },

    #[error("link check found {count} issue(s)")]
    LinkIssues { count: usize },
}

impl CommandError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::HasIncomingLinks { .. } => "has_incoming_links",
            Self::WouldCycle { .. } => "link_cycle",
            Self::LinkIssues { .. } => "link_issues",
        }
    }
}

/// Shared state handed to every command.
#[derive(Debug)]
pub struct CommandContext {
    pub json: bool,
    pub quiet: bool,
    pub resolved: ResolvedConfig,
}

impl CommandContext {
    /// Open the configured store.
    pub fn open_store(&self) -> Result<BeanStore> {
        let store = BeanStore::open(self.resolved.store_root(), self.resolved.config.clone())?;
        if self.resolved.config.gitflow.enabled {
            store.enable_gitflow(&self.resolved.project_dir)?;
        }
        Ok(store)
    }

    /// Print a human message unless `--json` or `--quiet` is set.
    pub fn say(&self, message: impl AsRef<str>) {
        if !self.json && !self.quiet {
            println!("{}", message.as_ref());
        }
    }
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn run(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let Some(command) = cli.command else {
        println!("beans - file-backed issue tracker. Use --help for usage.");
        return Ok(ExitCode::SUCCESS);
    };
    if let Commands::Version(args) = &command {
        commands::version::execute(args, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let overrides = CliOverrides {
        beans_dir: cli.beans_dir,
        prefix: cli.prefix,
    };
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let ctx = CommandContext {
        json: cli.json,
        quiet: cli.quiet,
        resolved: config::resolve(&cwd, &overrides)?,
    };
    tracing::debug!(command = command.name(), store = %ctx.resolved.store_root().display(), "dispatching");

    match command {
        Commands::Init(args) => commands::init::execute(&args, &ctx)?,
        Commands::Create(args) => commands::create::execute(args, &ctx)?,
        Commands::List(args) => commands::list::execute(&args, &ctx)?,
        Commands::Show(args) => commands::show::execute(&args.ids, &ctx)?,
        Commands::Update(args) => commands::update::execute(args, &ctx)?,
        Commands::Archive(args) => commands::archive::execute(&args, &ctx)?,
        Commands::Unarchive(args) => commands::archive::execute_unarchive(&args.ids, &ctx)?,
        Commands::Delete(args) => commands::delete::execute(&args, &ctx)?,
        Commands::Check(args) => commands::check::execute(&args, &ctx)?,
        Commands::Sync => commands::sync::execute(&ctx)?,
        Commands::Watch(args) => commands::watch::execute(&args, &ctx)?,
        Commands::Version(_) => {}
    }
    Ok(ExitCode::SUCCESS)
}

/// Stable code for any error surfaced by a command.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(err) = err.downcast_ref::<BeansError>() {
        err.code()
    } else if let Some(err) = err.downcast_ref::<CommandError>() {
        err.code()
    } else {
        "error"
    }
}

/// Print `err` as `error[code]: message`, or as a JSON object with `--json`.
pub fn report_error(err: &anyhow::Error, json: bool) {
    let code = error_code(err);
    let message = format!("{err:#}");
    if json {
        let payload = serde_json::json!({ "error": { "code": code, "message": message } });
        println!("{payload}");
    } else {
        eprintln!("error[{code}]: {message}");
    }
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Create(_) => "create",
            Self::List(_) => "list",
            Self::Show(_) => "show",
            Self::Update(_) => "update",
            Self::Archive(_) => "archive",
            Self::Unarchive(_) => "unarchive",
            Self::Delete(_) => "delete",
            Self::Check(_) => "check",
            Self::Sync => "sync",
            Self::Watch(_) => "watch",
            Self::Version(_) => "version",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_flags() {
        let cli = Cli::parse_from([
            "beans", "--json", "update", "ab12", "--status", "in-progress", "--blocks", "cd34",
            "--blocks", "ef56", "--if-match", "0123",
        ]);
        assert!(cli.json);
        let Some(Commands::Update(args)) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.id, "ab12");
        assert_eq!(args.status.as_deref(), Some("in-progress"));
        assert_eq!(args.blocks, vec!["cd34", "ef56"]);
        assert_eq!(args.if_match.as_deref(), Some("0123"));
    }

    #[test]
    fn test_error_codes() {
        let err = anyhow::Error::new(BeansError::not_found("beans-x"));
        assert_eq!(error_code(&err), "not_found");
        let err = anyhow::Error::new(CommandError::LinkIssues { count: 2 });
        assert_eq!(error_code(&err), "link_issues");
        assert_eq!(error_code(&anyhow::anyhow!("boom")), "error");
    }
}
