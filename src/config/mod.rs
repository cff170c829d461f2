//! Configuration discovery for the `beans` binary.
//!
//! Precedence, highest first:
//! - command-line flags (`--beans-dir`, `--prefix`)
//! - environment (`BEANS_PATH`, `BEANS_PREFIX`, `BEANS_REQUIRE_ETAG`)
//! - `.beans.yml`, found by walking up from the working directory
//! - built-in defaults

use beans_lib::{BeansError, CONFIG_FILE_NAME, Config, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PATH: &str = "BEANS_PATH";
pub const ENV_PREFIX: &str = "BEANS_PREFIX";
pub const ENV_REQUIRE_ETAG: &str = "BEANS_REQUIRE_ETAG";

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub beans_dir: Option<PathBuf>,
    pub prefix: Option<String>,
}

/// Configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory that holds (or would hold) `.beans.yml`.
    pub project_dir: PathBuf,
    /// The config file, when one was found.
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl ResolvedConfig {
    /// Absolute path of the store directory.
    #[must_use]
    pub fn store_root(&self) -> PathBuf {
        self.config.store_root(&self.project_dir)
    }

    /// Where `beans init` writes the config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.project_dir.join(CONFIG_FILE_NAME))
    }
}

/// Walk up from `start` to the first directory containing `.beans.yml`.
#[must_use]
pub fn discover_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Resolve configuration for a command run from `cwd`.
///
/// # Errors
///
/// Returns `Config` for an unreadable file or invalid override values.
pub fn resolve(cwd: &Path, overrides: &CliOverrides) -> Result<ResolvedConfig> {
    resolve_with_env(cwd, overrides, |key| std::env::var(key).ok())
}

/// [`resolve`] with an injectable environment lookup.
pub fn resolve_with_env<F>(cwd: &Path, overrides: &CliOverrides, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let cwd = dunce::canonicalize(cwd)?;
    let (project_dir, config_path, mut config) = match discover_config_file(&cwd) {
        Some(path) => {
            let config = Config::load(&path)?;
            let dir = path.parent().map_or_else(|| cwd.clone(), Path::to_path_buf);
            debug!(path = %path.display(), "loaded config");
            (dir, Some(path), config)
        }
        None => (cwd, None, Config::default()),
    };

    apply_env(&mut config, &env)?;
    apply_overrides(&mut config, overrides);
    config.validate()?;

    Ok(ResolvedConfig {
        project_dir,
        config_path,
        config,
    })
}

fn apply_env<F>(config: &mut Config, env: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env(ENV_PATH).filter(|v| !v.trim().is_empty()) {
        config.beans.path = PathBuf::from(path);
    }
    if let Some(prefix) = env(ENV_PREFIX).filter(|v| !v.trim().is_empty()) {
        config.beans.prefix = prefix.trim().to_lowercase();
    }
    if let Some(raw) = env(ENV_REQUIRE_ETAG) {
        config.beans.require_etag = parse_bool(&raw).ok_or_else(|| {
            BeansError::Config(format!("{ENV_REQUIRE_ETAG} must be true or false, got '{raw}'"))
        })?;
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(dir) = &overrides.beans_dir {
        config.beans.path.clone_from(dir);
    }
    if let Some(prefix) = &overrides.prefix {
        config.beans.prefix = prefix.trim().to_lowercase();
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
