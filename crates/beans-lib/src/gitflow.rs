//! Git branch lifecycle driven by bean status.
//!
//! Starting work on a parent bean creates `{id}/{slug}` from the base branch;
//! [`GitFlow::branch_state`] later tells whether that branch was merged or
//! thrown away. Conflict resolution and remotes are out of scope.

use chrono::{DateTime, Utc};
use git2::build::CheckoutBuilder;
use git2::{BranchType, Commit, ErrorCode, Oid, Repository, Signature, StatusOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::GitFlowConfig;
use crate::error::{BeansError, Result};

/// Commit message used when bean files are committed before branching.
pub const AUTO_COMMIT_MESSAGE: &str = "beans: update issue files";

/// First-parent commits inspected when looking for a merge of a deleted branch.
const MERGE_SEARCH_LIMIT: usize = 1000;

/// Uncommitted paths, split by whether they live in the beans directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeChanges {
    pub beans: Vec<String>,
    pub other: Vec<String>,
}

impl WorkingTreeChanges {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.beans.is_empty() && self.other.is_empty()
    }
}

/// Fate of a bean's branch relative to the base branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchState {
    Merged {
        commit: String,
        merged_at: DateTime<Utc>,
    },
    Unmerged,
    /// Branch is gone and no merge of it was found.
    Missing,
}

pub struct GitFlow {
    repo: Repository,
    repo_root: PathBuf,
    /// Beans directory relative to `repo_root`.
    beans_dir: PathBuf,
    config: GitFlowConfig,
}

impl std::fmt::Debug for GitFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitFlow")
            .field("repo_root", &self.repo_root)
            .field("beans_dir", &self.beans_dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GitFlow {
    /// Open the repository containing `workdir`. `beans_root` must live
    /// inside its working tree.
    pub fn open(workdir: &Path, beans_root: &Path, config: GitFlowConfig) -> Result<Self> {
        let repo = Repository::discover(workdir)?;
        let repo_root = dunce::canonicalize(repo.workdir().ok_or_else(|| {
            BeansError::Config("git flow needs a repository with a working tree".into())
        })?)?;
        let beans_dir = dunce::canonicalize(beans_root)?
            .strip_prefix(&repo_root)
            .map_err(|_| {
                BeansError::Config(format!(
                    "beans directory {} is outside repository {}",
                    beans_root.display(),
                    repo_root.display()
                ))
            })?
            .to_path_buf();

        debug!(repo = %repo_root.display(), beans_dir = %beans_dir.display(), "git flow opened");
        Ok(Self {
            repo,
            repo_root,
            beans_dir,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &GitFlowConfig {
        &self.config
    }

    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Current branch name, `None` when HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
            Ok(_) => Ok(None),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Working Tree
    // ========================================================================

    /// Uncommitted changes, untracked files included and ignored excluded.
    pub fn working_tree_changes(&self) -> Result<WorkingTreeChanges> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let mut changes = WorkingTreeChanges::default();
        for entry in self.repo.statuses(Some(&mut opts))?.iter() {
            let status = entry.status();
            if status.is_ignored() || status == git2::Status::CURRENT {
                continue;
            }
            let Some(path) = entry.path() else { continue };
            if Path::new(path).starts_with(&self.beans_dir) {
                changes.beans.push(path.to_string());
            } else {
                changes.other.push(path.to_string());
            }
        }
        changes.beans.sort();
        changes.other.sort();
        Ok(changes)
    }

    /// Ensure the tree is clean outside the beans directory and, when
    /// configured, commit pending bean files.
    pub fn prepare_for_branch(&self) -> Result<()> {
        let changes = self.working_tree_changes()?;
        if !changes.other.is_empty() {
            return Err(BeansError::DirtyWorkingTree {
                paths: changes.other,
            });
        }
        if !changes.beans.is_empty() && self.config.auto_commit_beans {
            let oid = self.commit_paths(&changes.beans, AUTO_COMMIT_MESSAGE)?;
            info!(commit = %oid, files = changes.beans.len(), "committed bean files");
        }
        Ok(())
    }

    /// Stage `paths` (additions and deletions) and commit them on HEAD.
    pub fn commit_paths(&self, paths: &[String], message: &str) -> Result<Oid> {
        let mut index = self.repo.index()?;
        for path in paths {
            let rel = Path::new(path);
            if self.repo_root.join(rel).exists() {
                index.add_path(rel)?;
            } else {
                index.remove_path(rel)?;
            }
        }
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let sig = self.signature()?;
        Ok(self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now("beans", "beans@localhost")?),
        }
    }

    // ========================================================================
    // Branches
    // ========================================================================

    fn base_commit(&self) -> Result<Commit<'_>> {
        let base = self
            .repo
            .find_branch(&self.config.base_branch, BranchType::Local)?;
        Ok(base.get().peel_to_commit()?)
    }

    /// Check out `name`, creating it from the base branch tip when missing.
    ///
    /// Returns true when HEAD now points at a different commit, meaning the
    /// files on disk may have changed.
    pub fn checkout_branch(&self, name: &str) -> Result<bool> {
        let head_before = self.repo.head().ok().and_then(|h| h.target());

        let branch = match self.repo.find_branch(name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == ErrorCode::NotFound => {
                let base = self.base_commit()?;
                let branch = self.repo.branch(name, &base, false)?;
                info!(branch = name, base = %self.config.base_branch, "created branch");
                branch
            }
            Err(e) => return Err(e.into()),
        };

        let target = branch.get().peel_to_commit()?;
        let refname = branch
            .get()
            .name()
            .ok_or_else(|| BeansError::Config(format!("branch name is not UTF-8: {name}")))?
            .to_string();

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(target.as_object(), Some(&mut checkout))?;
        self.repo.set_head(&refname)?;
        info!(branch = name, "checked out branch");

        Ok(head_before != Some(target.id()))
    }

    #[must_use]
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// Commit where `name` left the base branch.
    pub fn fork_point(&self, name: &str) -> Result<Oid> {
        let branch = self.repo.find_branch(name, BranchType::Local)?;
        let tip = branch.get().peel_to_commit()?;
        let base = self.base_commit()?;
        Ok(self.repo.merge_base(tip.id(), base.id())?)
    }

    /// Decide whether `name` was merged into the base branch.
    ///
    /// An existing branch is merged when base contains its tip and the tip
    /// carries work of its own: it moved past `fork` or, when no fork commit
    /// was recorded, it is newer than `created_at`. A fresh branch still
    /// sitting on its fork point is never merged, however far base moves.
    pub fn branch_state(
        &self,
        name: &str,
        created_at: Option<DateTime<Utc>>,
        fork: Option<&str>,
    ) -> Result<BranchState> {
        let base = self.base_commit()?;

        match self.repo.find_branch(name, BranchType::Local) {
            Ok(branch) => {
                let tip = branch.get().peel_to_commit()?;
                let has_work = match fork.map(Oid::from_str).transpose() {
                    Ok(Some(fork)) => tip.id() != fork,
                    _ => created_at.is_some_and(|created| tip.time().seconds() > created.timestamp()),
                };
                let contained =
                    tip.id() == base.id() || self.repo.graph_descendant_of(base.id(), tip.id())?;
                if !(has_work && contained) {
                    return Ok(BranchState::Unmerged);
                }
                let merge = self.merge_commit_for(&base, tip.id())?;
                Ok(merged_state(&merge))
            }
            Err(e) if e.code() == ErrorCode::NotFound => match self.merge_commit_naming(&base, name)? {
                Some(merge) => Ok(merged_state(&merge)),
                None => Ok(BranchState::Missing),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Oldest commit on base's first-parent chain that still contains `tip`.
    fn merge_commit_for<'r>(&'r self, base: &Commit<'r>, tip: Oid) -> Result<Commit<'r>> {
        let mut found = base.clone();
        let mut current = base.clone();
        for _ in 0..MERGE_SEARCH_LIMIT {
            let Ok(parent) = current.parent(0) else { break };
            if parent.id() != tip && !self.repo.graph_descendant_of(parent.id(), tip)? {
                break;
            }
            found = parent.clone();
            current = parent;
        }
        Ok(found)
    }

    /// Merge commit on base's first-parent history whose summary names `branch`.
    fn merge_commit_naming<'r>(&'r self, base: &Commit<'r>, branch: &str) -> Result<Option<Commit<'r>>> {
        let mut walk = self.repo.revwalk()?;
        walk.push(base.id())?;
        walk.simplify_first_parent()?;

        let quoted = format!("'{branch}'");
        for oid in walk.take(MERGE_SEARCH_LIMIT) {
            let commit = self.repo.find_commit(oid?)?;
            if commit.parent_count() > 1 && commit.summary().is_some_and(|s| s.contains(&quoted)) {
                return Ok(Some(commit));
            }
        }
        Ok(None)
    }
}

fn merged_state(commit: &Commit<'_>) -> BranchState {
    BranchState::Merged {
        commit: commit.id().to_string(),
        merged_at: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::RepositoryInitOptions;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir, &opts).unwrap();
        {
            let mut cfg = repo.config().unwrap();
            cfg.set_str("user.name", "Test").unwrap();
            cfg.set_str("user.email", "test@example.com").unwrap();
        }
        fs::write(dir.join("README.md"), "hello\n").unwrap();
        fs::create_dir_all(dir.join(".beans")).unwrap();
        repo
    }

    fn open_flow(dir: &Path) -> GitFlow {
        GitFlow::open(dir, &dir.join(".beans"), GitFlowConfig::default()).unwrap()
    }

    #[test]
    fn test_open_rejects_store_outside_repo() {
        let repo_dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        init_repo(repo_dir.path());
        let result = GitFlow::open(repo_dir.path(), other.path(), GitFlowConfig::default());
        assert!(matches!(result, Err(BeansError::Config(_))));
    }

    #[test]
    fn test_working_tree_changes_split() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join(".beans/beans-ab12.md"), "x").unwrap();
        let flow = open_flow(dir.path());

        let changes = flow.working_tree_changes().unwrap();
        assert_eq!(changes.beans, vec![".beans/beans-ab12.md"]);
        assert_eq!(changes.other, vec!["README.md"]);
    }

    #[test]
    fn test_prepare_rejects_dirty_tree() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let flow = open_flow(dir.path());

        let result = flow.prepare_for_branch();
        assert!(matches!(
            result,
            Err(BeansError::DirtyWorkingTree { ref paths }) if paths == &vec!["README.md".to_string()]
        ));
    }

    #[test]
    fn test_prepare_commits_bean_files() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let flow = open_flow(dir.path());
        flow.commit_paths(&["README.md".to_string()], "initial").unwrap();
        fs::write(dir.path().join(".beans/beans-ab12.md"), "x").unwrap();

        flow.prepare_for_branch().unwrap();
        assert!(flow.working_tree_changes().unwrap().is_clean());
        let head = flow.repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.summary(), Some(AUTO_COMMIT_MESSAGE));
    }

    #[test]
    fn test_checkout_branch_from_base() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let flow = open_flow(dir.path());
        flow.commit_paths(&["README.md".to_string()], "initial").unwrap();

        let moved = flow.checkout_branch("beans-ab12/fix-login").unwrap();
        assert!(!moved);
        assert_eq!(
            flow.current_branch().unwrap().as_deref(),
            Some("beans-ab12/fix-login")
        );
        assert!(flow.branch_exists("beans-ab12/fix-login"));

        // Existing branch is reused.
        flow.checkout_branch("beans-ab12/fix-login").unwrap();
        let fork = flow.fork_point("beans-ab12/fix-login").unwrap().to_string();
        assert_eq!(
            flow.branch_state("beans-ab12/fix-login", Some(Utc::now()), Some(&fork)).unwrap(),
            BranchState::Unmerged
        );
    }

    #[test]
    fn test_missing_branch_state() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let flow = open_flow(dir.path());
        flow.commit_paths(&["README.md".to_string()], "initial").unwrap();
        assert_eq!(
            flow.branch_state("beans-zz99/gone", None, None).unwrap(),
            BranchState::Missing
        );
    }

    #[test]
    fn test_deleted_branch_matched_by_quoted_name() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let flow = open_flow(dir.path());
        let root = flow.commit_paths(&["README.md".to_string()], "initial").unwrap();
        let root = flow.repo.find_commit(root).unwrap();

        // Side commit merged into main under the longer branch name.
        let sig = flow.signature().unwrap();
        let tree = root.tree().unwrap();
        let side = flow.repo.commit(None, &sig, &sig, "side work", &tree, &[&root]).unwrap();
        let side = flow.repo.find_commit(side).unwrap();
        let merge = flow
            .repo
            .commit(
                Some("HEAD"),
                &sig,
                &sig,
                "Merge branch 'beans-ab12/fix-login'",
                &tree,
                &[&root, &side],
            )
            .unwrap();

        assert!(matches!(
            flow.branch_state("beans-ab12/fix-login", None, None).unwrap(),
            BranchState::Merged { ref commit, .. } if *commit == merge.to_string()
        ));
        assert_eq!(
            flow.branch_state("beans-ab12/fix", None, None).unwrap(),
            BranchState::Missing
        );
    }
}
