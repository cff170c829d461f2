use assert_cmd::Command;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tempfile::TempDir;

/// Temporary project directory for CLI runs.
pub struct BeansWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl BeansWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    pub fn beans_dir(&self) -> PathBuf {
        self.root.join(".beans")
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Command rooted in the workspace with a clean environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("beans");
        cmd.current_dir(&self.root)
            .env_remove("BEANS_PATH")
            .env_remove("BEANS_PREFIX")
            .env_remove("BEANS_REQUIRE_ETAG")
            .env_remove("RUST_LOG");
        cmd
    }
}

pub struct BeansOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl BeansOutput {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("invalid JSON ({e}): {}", self.stdout))
    }
}

/// Run `beans` with `args` and capture its output. `label` names the step in
/// failure messages.
pub fn run_beans<I, S>(workspace: &BeansWorkspace, args: I, label: &str) -> BeansOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = workspace
        .cmd()
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("{label}: failed to run beans: {e}"));
    BeansOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Run and require success, returning parsed JSON from `--json`.
pub fn run_json<I, S>(workspace: &BeansWorkspace, args: I, label: &str) -> serde_json::Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut all: Vec<std::ffi::OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    all.push("--json".into());
    let out = run_beans(workspace, all, label);
    assert!(
        out.status.success(),
        "{label} failed\nstdout: {}\nstderr: {}",
        out.stdout,
        out.stderr
    );
    out.json()
}
