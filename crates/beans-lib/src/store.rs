//! File-backed bean store with an in-memory index.
//!
//! Disk is the source of truth. Every mutation takes the index write lock,
//! performs its file I/O and updates the index inside the same critical
//! section, so readers never observe the two out of step.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::codec;
use crate::config::Config;
use crate::error::{BeansError, Result};
use crate::gitflow::{BranchState, GitFlow};
use crate::ids::{ARCHIVE_DIR, filename, generate_id, is_valid_id, parse_filename, slugify};
use crate::index::BeanIndex;
use crate::links::{self, LinkReport};
use crate::model::{Bean, LinkType, Status};
use crate::watcher::{ChangeEvent, ChangeKind, StoreWatcher, Subscription};

/// A file skipped while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`BeanStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    /// Files that failed to parse.
    pub skipped: Vec<LoadWarning>,
    /// Files whose id was already taken by an earlier file.
    pub duplicates: Vec<LoadWarning>,
}

/// An edge pointing at a given bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomingLink {
    pub from_id: String,
    pub link_type: LinkType,
}

/// Thread-safe bean store. Share it via `Arc`.
pub struct BeanStore {
    root: PathBuf,
    config: Config,
    index: RwLock<BeanIndex>,
    gitflow: Mutex<Option<GitFlow>>,
    watcher: StoreWatcher,
}

impl std::fmt::Debug for BeanStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanStore")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BeanStore {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open an existing store directory and load it.
    ///
    /// # Errors
    ///
    /// Returns `Config` when the directory is missing, or any load error.
    pub fn open(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = root.as_ref();
        config.validate()?;
        if !root.is_dir() {
            return Err(BeansError::Config(format!(
                "beans directory not found: {} (run `beans init`)",
                root.display()
            )));
        }
        let root = dunce::canonicalize(root)?;

        let store = Self {
            watcher: StoreWatcher::new(config.watch.subscriber_buffer),
            root,
            config,
            index: RwLock::new(BeanIndex::new()),
            gitflow: Mutex::new(None),
        };
        store.load()?;
        Ok(store)
    }

    /// Create the store directory and `archive/` if needed, then open it.
    pub fn init(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(ARCHIVE_DIR))?;
        debug!(root = %root.display(), "initialized beans directory");
        Self::open(root, config)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.config.beans.prefix
    }

    /// Rebuild the index from disk.
    pub fn load(&self) -> Result<LoadReport> {
        let mut index = self.write_index()?;
        let (fresh, report) = scan(&self.root);
        *index = fresh;
        debug!(
            loaded = report.loaded,
            skipped = report.skipped.len(),
            duplicates = report.duplicates.len(),
            "loaded beans"
        );
        Ok(report)
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, BeanIndex>> {
        Ok(self.index.read()?)
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, BeanIndex>> {
        Ok(self.index.write()?)
    }

    fn write_bean(&self, bean: &Bean) -> Result<()> {
        let content = codec::encode(bean)?;
        codec::write_atomic(&self.root.join(&bean.path), &content)
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Persist a new bean. An empty `id` is generated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty title or malformed id, and
    /// `IdCollision` when the id is taken.
    pub fn create(&self, mut bean: Bean) -> Result<Bean> {
        bean.title = bean.title.trim().to_string();
        if bean.title.is_empty() {
            return Err(BeansError::validation("title", "cannot be empty"));
        }

        let mut index = self.write_index()?;
        if bean.id.trim().is_empty() {
            bean.id = generate_id(self.prefix(), self.config.beans.id_length, |candidate| {
                index.contains(candidate)
            });
        } else {
            bean.id = bean.id.trim().to_lowercase();
            if !is_valid_id(&bean.id) {
                return Err(BeansError::validation(
                    "id",
                    format!("'{}' must be lowercase alphanumerics separated by single dashes", bean.id),
                ));
            }
            if index.contains(&bean.id) {
                return Err(BeansError::IdCollision { id: bean.id });
            }
        }

        let slug = slugify(&bean.title);
        bean.slug = (!slug.is_empty()).then_some(slug);
        bean.path = PathBuf::from(filename(&bean.id, bean.slug.as_deref()));
        if self.root.join(&bean.path).exists() {
            return Err(BeansError::IdCollision { id: bean.id });
        }

        let now = Utc::now();
        bean.created_at = now;
        bean.updated_at = now;
        bean.normalize();
        bean.body = bean.body.trim_end_matches('\n').to_string();

        self.write_bean(&bean)?;
        index.insert(bean.clone());
        debug!(id = %bean.id, "created bean");
        Ok(bean)
    }

    /// Fetch a bean by full or short id.
    pub fn get(&self, id: &str) -> Result<Bean> {
        let index = self.read_index()?;
        let id = index.resolve(id, self.prefix())?;
        index.get(&id).cloned().ok_or_else(|| BeansError::not_found(id))
    }

    /// Resolve a full or short id to the stored id.
    pub fn resolve_id(&self, input: &str) -> Result<String> {
        self.read_index()?.resolve(input, self.prefix())
    }

    /// Snapshot of every bean, active and archived, sorted by id.
    pub fn all(&self) -> Result<Vec<Bean>> {
        Ok(self.read_index()?.snapshot())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_index()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_index()?.is_empty())
    }

    /// Current fingerprint of a stored bean.
    pub fn etag(&self, id: &str) -> Result<String> {
        self.get(id)?.etag()
    }

    /// Replace a stored bean.
    ///
    /// `created_at`, `path` and `slug` are kept from the stored copy and
    /// `updated_at` is refreshed. With `expected_etag` the write only happens
    /// if the stored fingerprint still matches.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `ETagRequired`, `ETagMismatch`, and git flow errors
    /// when the status change starts a branch.
    pub fn update(&self, bean: Bean, expected_etag: Option<&str>) -> Result<Bean> {
        let mut index = self.write_index()?;
        let current = index
            .get(&bean.id)
            .cloned()
            .ok_or_else(|| BeansError::not_found(&bean.id))?;

        match expected_etag {
            None if self.config.beans.require_etag => {
                return Err(BeansError::ETagRequired { id: bean.id });
            }
            Some(expected) => {
                let actual = current.etag()?;
                if expected != actual {
                    return Err(BeansError::ETagMismatch {
                        id: bean.id,
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
            None => {}
        }

        let mut updated = bean;
        updated.title = updated.title.trim().to_string();
        if updated.title.is_empty() {
            return Err(BeansError::validation("title", "cannot be empty"));
        }
        updated.created_at = current.created_at;
        updated.path = current.path.clone();
        updated.slug = current.slug.clone();
        updated.updated_at = Utc::now();
        updated.normalize();
        updated.body = updated.body.trim_end_matches('\n').to_string();

        self.start_branch_if_needed(&mut index, &current, &mut updated)?;

        self.write_bean(&updated)?;
        index.insert(updated.clone());
        debug!(id = %updated.id, "updated bean");
        Ok(updated)
    }

    /// Remove a bean file and evict it from the index.
    pub fn delete(&self, id: &str) -> Result<Bean> {
        let mut index = self.write_index()?;
        let id = index.resolve(id, self.prefix())?;
        self.delete_locked(&mut index, &id)
    }

    /// Strip every incoming edge, then delete. Returns the bean and the
    /// number of edges removed.
    pub fn delete_with_links(&self, id: &str) -> Result<(Bean, usize)> {
        let mut index = self.write_index()?;
        let id = index.resolve(id, self.prefix())?;
        let removed = self.remove_links_to_locked(&mut index, &id)?;
        let bean = self.delete_locked(&mut index, &id)?;
        Ok((bean, removed))
    }

    fn delete_locked(&self, index: &mut BeanIndex, id: &str) -> Result<Bean> {
        let bean = index.get(id).cloned().ok_or_else(|| BeansError::not_found(id))?;
        match fs::remove_file(self.root.join(&bean.path)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(id, "bean file already gone");
            }
            Err(e) => return Err(e.into()),
        }
        index.remove(id);
        debug!(id, "deleted bean");
        Ok(bean)
    }

    // ========================================================================
    // Archive
    // ========================================================================

    /// Move a bean under `archive/`. Repeating it is a no-op.
    pub fn archive(&self, id: &str) -> Result<Bean> {
        let mut index = self.write_index()?;
        let id = index.resolve(id, self.prefix())?;
        self.relocate(&mut index, &id, true)
    }

    /// Move an archived bean back to the store root. Repeating it is a no-op.
    pub fn unarchive(&self, id: &str) -> Result<Bean> {
        let mut index = self.write_index()?;
        let id = index.resolve(id, self.prefix())?;
        self.relocate(&mut index, &id, false)
    }

    /// Archive every active bean whose status is configured as archivable.
    pub fn archive_eligible(&self) -> Result<Vec<String>> {
        let mut index = self.write_index()?;
        let mut ids: Vec<String> = index
            .values()
            .filter(|b| !b.is_archived() && self.config.beans.archive_statuses.contains(&b.status))
            .map(|b| b.id.clone())
            .collect();
        ids.sort();
        for id in &ids {
            self.relocate(&mut index, id, true)?;
        }
        Ok(ids)
    }

    fn relocate(&self, index: &mut BeanIndex, id: &str, archived: bool) -> Result<Bean> {
        let mut bean = index.get(id).cloned().ok_or_else(|| BeansError::not_found(id))?;
        if bean.is_archived() == archived {
            return Ok(bean);
        }

        let file = bean
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| BeansError::validation("path", "bean has no filename"))?;
        let new_rel = if archived {
            Path::new(ARCHIVE_DIR).join(&file)
        } else {
            PathBuf::from(&file)
        };
        let dest = self.root.join(&new_rel);
        if dest.exists() {
            return Err(BeansError::IdCollision { id: id.to_string() });
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.root.join(&bean.path), &dest)?;

        bean.path = new_rel;
        index.insert(bean.clone());
        debug!(id, archived, "moved bean");
        Ok(bean)
    }

    // ========================================================================
    // Links
    // ========================================================================

    fn hierarchical(&self) -> &[LinkType] {
        &self.config.beans.hierarchical_link_types
    }

    /// Full integrity scan.
    pub fn check_all_links(&self) -> Result<LinkReport> {
        let index = self.read_index()?;
        Ok(links::check_all_links(&index, self.hierarchical()))
    }

    /// Cycle that adding `from --link_type--> to` would close, if any.
    pub fn detect_cycle(&self, from: &str, link_type: &LinkType, to: &str) -> Result<Option<Vec<String>>> {
        let index = self.read_index()?;
        Ok(links::detect_cycle(&index, self.hierarchical(), from, link_type, to))
    }

    /// Remove broken and self-referential edges. Cycles are left alone.
    ///
    /// Returns the number of edges removed.
    pub fn fix_broken_links(&self) -> Result<usize> {
        let mut index = self.write_index()?;
        let report = links::check_all_links(&index, self.hierarchical());

        let mut doomed: BTreeMap<String, Vec<(LinkType, String)>> = BTreeMap::new();
        for broken in report.broken {
            doomed
                .entry(broken.bean_id)
                .or_default()
                .push((broken.link_type, broken.target));
        }
        for self_link in report.self_links {
            let target = self_link.bean_id.clone();
            doomed
                .entry(self_link.bean_id)
                .or_default()
                .push((self_link.link_type, target));
        }

        let now = Utc::now();
        let mut removed = 0;
        for (id, edges) in doomed {
            let Some(mut bean) = index.get(&id).cloned() else {
                continue;
            };
            let before = bean.links.len();
            bean.links
                .retain(|l| !edges.iter().any(|(t, target)| &l.link_type == t && &l.target == target));
            let count = before - bean.links.len();
            if count == 0 {
                continue;
            }
            bean.updated_at = now;
            self.write_bean(&bean)?;
            index.insert(bean);
            removed += count;
        }

        if removed > 0 {
            info!(removed, "removed broken links");
        }
        Ok(removed)
    }

    /// Every edge that points at `target`.
    pub fn find_incoming_links(&self, target: &str) -> Result<Vec<IncomingLink>> {
        let target = target.trim().to_lowercase();
        Ok(self
            .read_index()?
            .incoming(&target)
            .into_iter()
            .map(|(from_id, link_type)| IncomingLink { from_id, link_type })
            .collect())
    }

    /// Strip and persist every edge that points at `target`.
    pub fn remove_links_to(&self, target: &str) -> Result<usize> {
        let target = target.trim().to_lowercase();
        let mut index = self.write_index()?;
        self.remove_links_to_locked(&mut index, &target)
    }

    fn remove_links_to_locked(&self, index: &mut BeanIndex, target: &str) -> Result<usize> {
        let mut affected: Vec<String> = index
            .values()
            .filter(|b| b.links.iter().any(|l| l.target == target))
            .map(|b| b.id.clone())
            .collect();
        affected.sort();

        let now = Utc::now();
        let mut removed = 0;
        for id in affected {
            let Some(mut bean) = index.get(&id).cloned() else {
                continue;
            };
            removed += bean.remove_links_to(target);
            bean.updated_at = now;
            self.write_bean(&bean)?;
            index.insert(bean);
        }
        debug!(target, removed, "removed incoming links");
        Ok(removed)
    }

    // ========================================================================
    // Git Flow
    // ========================================================================

    /// Turn on branch management for the repository containing `workdir`.
    pub fn enable_gitflow(&self, workdir: impl AsRef<Path>) -> Result<()> {
        let flow = GitFlow::open(workdir.as_ref(), &self.root, self.config.gitflow.clone())?;
        info!(repo = %flow.repo_root().display(), "git flow enabled");
        *self.gitflow.lock()? = Some(flow);
        Ok(())
    }

    pub fn disable_gitflow(&self) -> Result<()> {
        if self.gitflow.lock()?.take().is_some() {
            info!("git flow disabled");
        }
        Ok(())
    }

    #[must_use]
    pub fn is_gitflow_enabled(&self) -> bool {
        self.gitflow.lock().is_ok_and(|flow| flow.is_some())
    }

    /// Create or check out the bean's branch when it enters `in-progress`
    /// and has children. Runs before the bean is written; any error aborts
    /// the update.
    fn start_branch_if_needed(&self, index: &mut BeanIndex, current: &Bean, updated: &mut Bean) -> Result<()> {
        if updated.status != Status::InProgress || current.status == Status::InProgress {
            return Ok(());
        }
        let guard = self.gitflow.lock()?;
        let Some(flow) = guard.as_ref() else {
            return Ok(());
        };
        if !flow.config().auto_create_branch || !index.has_children(&current.id) {
            return Ok(());
        }

        flow.prepare_for_branch()?;
        let branch = updated
            .git_branch
            .clone()
            .unwrap_or_else(|| updated.branch_name());
        let head_moved = flow.checkout_branch(&branch)?;
        if head_moved {
            // Checkout may have rewritten bean files.
            let (fresh, _) = scan(&self.root);
            *index = fresh;
        }

        updated.git_created_at.get_or_insert_with(Utc::now);
        if updated.git_fork_commit.is_none() {
            updated.git_fork_commit = Some(flow.fork_point(&branch)?.to_string());
        }
        updated.git_branch = Some(branch);
        Ok(())
    }

    /// Settle beans whose branches were merged or deleted.
    ///
    /// Returns the beans that changed.
    ///
    /// # Errors
    ///
    /// Returns `GitFlowDisabled` when git flow is off.
    pub fn sync_gitflow(&self) -> Result<Vec<Bean>> {
        let mut index = self.write_index()?;
        let guard = self.gitflow.lock()?;
        let flow = guard.as_ref().ok_or(BeansError::GitFlowDisabled)?;

        let candidates: Vec<Bean> = index
            .snapshot()
            .into_iter()
            .filter(|b| b.git_branch.is_some() && !b.status.is_terminal())
            .collect();

        let mut changed = Vec::new();
        for mut bean in candidates {
            let Some(branch) = bean.git_branch.clone() else {
                continue;
            };
            match flow.branch_state(&branch, bean.git_created_at, bean.git_fork_commit.as_deref())? {
                BranchState::Merged { commit, merged_at } => {
                    bean.status = Status::Completed;
                    bean.git_merged_at = Some(merged_at);
                    bean.git_merge_commit = Some(commit);
                    info!(id = %bean.id, branch, "branch merged, bean completed");
                }
                BranchState::Missing => {
                    bean.status = Status::Scrapped;
                    info!(id = %bean.id, branch, "branch deleted, bean scrapped");
                }
                BranchState::Unmerged => continue,
            }
            bean.updated_at = Utc::now();
            self.write_bean(&bean)?;
            index.insert(bean.clone());
            changed.push(bean);
        }
        Ok(changed)
    }

    // ========================================================================
    // Watching
    // ========================================================================

    /// Start the filesystem watcher. Idempotent.
    pub fn watch(self: &Arc<Self>) -> Result<()> {
        self.watcher
            .start(Arc::downgrade(self), &self.root, self.config.watch.debounce())
    }

    /// Stop the filesystem watcher. Idempotent.
    pub fn unwatch(&self) {
        self.watcher.stop();
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.is_running()
    }

    /// Register a subscriber queue for change batches.
    pub fn subscribe(&self) -> Result<Subscription> {
        self.watcher.hub().subscribe()
    }

    /// Stop watching and close every subscriber queue.
    pub fn close(&self) {
        self.watcher.stop();
        self.watcher.hub().close();
    }

    /// Map an absolute path from the watcher to a bean path under the root.
    fn bean_rel_path(&self, path: &Path) -> Option<PathBuf> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<Component<'_>> = rel.components().collect();
        let name = match parts.as_slice() {
            [Component::Normal(name)] => name,
            [Component::Normal(dir), Component::Normal(name)] if *dir == ARCHIVE_DIR => name,
            _ => return None,
        };
        parse_filename(name.to_str()?)?;
        Some(rel.to_path_buf())
    }

    /// Bring the index in line with the current state of `paths` on disk.
    ///
    /// Present paths are handled before absent ones so an external move is
    /// reported once as an update.
    pub(crate) fn reconcile(&self, paths: &BTreeSet<PathBuf>) -> Result<Vec<ChangeEvent>> {
        let (present, absent): (Vec<PathBuf>, Vec<PathBuf>) = paths
            .iter()
            .filter_map(|p| self.bean_rel_path(p))
            .partition(|rel| self.root.join(rel).is_file());
        if present.is_empty() && absent.is_empty() {
            return Ok(Vec::new());
        }

        let mut index = self.write_index()?;
        let mut events = Vec::new();

        for rel in present {
            let bean = match codec::read_bean(&self.root, &rel) {
                Ok(bean) => bean,
                Err(err) => {
                    warn!(path = %rel.display(), error = %err, "skipping unreadable bean");
                    continue;
                }
            };
            let kind = match index.get(&bean.id) {
                None => ChangeKind::Created,
                Some(existing) if *existing == bean => continue,
                Some(existing) if existing.path != rel && self.root.join(&existing.path).is_file() => {
                    warn!(id = %bean.id, path = %rel.display(), "duplicate bean id, keeping indexed file");
                    continue;
                }
                Some(_) => ChangeKind::Updated,
            };
            index.insert(bean.clone());
            events.push(ChangeEvent {
                kind,
                id: bean.id.clone(),
                bean: Some(bean),
            });
        }

        for rel in absent {
            let Some(id) = index.find_by_path(&rel).map(|b| b.id.clone()) else {
                continue;
            };
            index.remove(&id);
            events.push(ChangeEvent {
                kind: ChangeKind::Deleted,
                id,
                bean: None,
            });
        }

        Ok(events)
    }
}

/// Read the store root and `archive/` (one level each) into a fresh index.
fn scan(root: &Path) -> (BeanIndex, LoadReport) {
    let mut index = BeanIndex::new();
    let mut report = LoadReport::default();

    for dir in [root.to_path_buf(), root.join(ARCHIVE_DIR)] {
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "failed to read directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if parse_filename(name).is_none() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };

            match codec::read_bean(root, rel) {
                Ok(bean) => {
                    if let Some(existing) = index.get(&bean.id) {
                        warn!(id = %bean.id, path = %rel.display(), first = %existing.path.display(), "duplicate bean id");
                        report.duplicates.push(LoadWarning {
                            path: rel.to_path_buf(),
                            reason: format!("id {} already loaded from {}", bean.id, existing.path.display()),
                        });
                        continue;
                    }
                    index.insert(bean);
                    report.loaded += 1;
                }
                Err(err) => {
                    warn!(path = %rel.display(), error = %err, "skipping unreadable bean");
                    report.skipped.push(LoadWarning {
                        path: rel.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
    (index, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, BeanStore) {
        let dir = TempDir::new().unwrap();
        let store = BeanStore::init(dir.path().join(".beans"), Config::default()).unwrap();
        (dir, store)
    }

    fn make_bean(title: &str) -> Bean {
        Bean::new(title)
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, store) = make_store();
        let created = store.create(make_bean("Test bean")).unwrap();
        assert!(created.id.starts_with("beans-"));
        assert_eq!(created.slug.as_deref(), Some("test-bean"));
        assert!(store.root().join(&created.path).is_file());

        let fetched = store.get(&created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_create_with_explicit_id() {
        let (_dir, store) = make_store();
        let mut bean = make_bean("Explicit");
        bean.id = "beans-test1".into();
        let created = store.create(bean).unwrap();
        assert_eq!(created.id, "beans-test1");
        assert_eq!(created.path, PathBuf::from("beans-test1--explicit.md"));
    }

    #[test]
    fn test_create_id_collision() {
        let (_dir, store) = make_store();
        let mut first = make_bean("First");
        first.id = "beans-test1".into();
        store.create(first).unwrap();

        let mut dup = make_bean("Duplicate");
        dup.id = "beans-test1".into();
        let result = store.create(dup);
        assert!(matches!(result, Err(BeansError::IdCollision { .. })));
    }

    #[test]
    fn test_create_empty_title_rejected() {
        let (_dir, store) = make_store();
        let result = store.create(make_bean("   "));
        assert!(matches!(result, Err(BeansError::Validation { .. })));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_get_short_id_and_not_found() {
        let (_dir, store) = make_store();
        let mut bean = make_bean("Short");
        bean.id = "beans-ab12".into();
        store.create(bean).unwrap();

        assert_eq!(store.get("ab12").unwrap().id, "beans-ab12");
        assert_eq!(store.get("BEANS-AB12").unwrap().id, "beans-ab12");
        assert!(matches!(store.get("ab"), Err(BeansError::NotFound { .. })));
    }

    #[test]
    fn test_update_preserves_identity_fields() {
        let (_dir, store) = make_store();
        let created = store.create(make_bean("Original")).unwrap();

        let mut edit = created.clone();
        edit.title = "Renamed".into();
        edit.status = Status::Completed;
        edit.created_at = Utc::now() + chrono::Duration::days(3);
        edit.path = PathBuf::from("elsewhere.md");
        edit.tags = vec!["Needs Review".into(), "needs review".into()];
        let updated = store.update(edit, None).unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.path, created.path);
        assert_eq!(updated.slug, created.slug);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.tags, vec!["needs-review".to_string()]);

        let reloaded = codec::read_bean(store.root(), &updated.path).unwrap();
        assert_eq!(reloaded, updated);
    }

    #[test]
    fn test_update_nonexistent() {
        let (_dir, store) = make_store();
        let mut ghost = make_bean("Ghost");
        ghost.id = "beans-nope".into();
        assert!(matches!(store.update(ghost, None), Err(BeansError::NotFound { .. })));
    }

    #[test]
    fn test_update_etag_flow() {
        let (_dir, store) = make_store();
        let created = store.create(make_bean("Etag")).unwrap();
        let e0 = created.etag().unwrap();
        assert_eq!(store.etag(&created.id).unwrap(), e0);

        let mut first = created.clone();
        first.body = "first writer".into();
        let after = store.update(first, Some(&e0)).unwrap();
        let e1 = after.etag().unwrap();
        assert_ne!(e0, e1);

        let mut stale = created;
        stale.body = "second writer".into();
        let result = store.update(stale, Some(&e0));
        assert!(matches!(
            result,
            Err(BeansError::ETagMismatch { ref expected, ref actual, .. }) if expected == &e0 && actual == &e1
        ));

        let on_disk = codec::read_bean(store.root(), &after.path).unwrap();
        assert_eq!(on_disk.body, "first writer");
    }

    #[test]
    fn test_update_requires_etag_in_strict_mode() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.beans.require_etag = true;
        let store = BeanStore::init(dir.path().join(".beans"), config).unwrap();
        let created = store.create(make_bean("Strict")).unwrap();

        let result = store.update(created.clone(), None);
        assert!(matches!(result, Err(BeansError::ETagRequired { .. })));
        let etag = created.etag().unwrap();
        store.update(created, Some(&etag)).unwrap();
    }

    #[test]
    fn test_delete_removes_file() {
        let (_dir, store) = make_store();
        let created = store.create(make_bean("Doomed")).unwrap();
        let removed = store.delete(&created.id).unwrap();
        assert_eq!(removed.id, created.id);
        assert!(!store.root().join(&created.path).exists());
        assert!(matches!(store.get(&created.id), Err(BeansError::NotFound { .. })));
        assert!(matches!(store.delete(&created.id), Err(BeansError::NotFound { .. })));
    }

    #[test]
    fn test_archive_round_trip() {
        let (_dir, store) = make_store();
        let created = store.create(make_bean("Archive me")).unwrap();

        let archived = store.archive(&created.id).unwrap();
        assert!(archived.is_archived());
        assert!(store.root().join(&archived.path).is_file());
        assert!(!store.root().join(&created.path).exists());
        assert_eq!(store.get(&created.id).unwrap().path, archived.path);
        assert_eq!(store.archive(&created.id).unwrap(), archived);

        let restored = store.unarchive(&created.id).unwrap();
        assert_eq!(restored, created);
        assert_eq!(store.unarchive(&created.id).unwrap(), created);
    }

    #[test]
    fn test_archive_eligible() {
        let (_dir, store) = make_store();
        let done = store.create(make_bean("Done")).unwrap();
        let open = store.create(make_bean("Open")).unwrap();
        let mut edit = done.clone();
        edit.status = Status::Completed;
        store.update(edit, None).unwrap();

        let archived = store.archive_eligible().unwrap();
        assert_eq!(archived, vec![done.id.clone()]);
        assert!(store.get(&done.id).unwrap().is_archived());
        assert!(!store.get(&open.id).unwrap().is_archived());
        assert!(store.archive_eligible().unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_malformed_and_foreign_files() {
        let (_dir, store) = make_store();
        let good = store.create(make_bean("Good")).unwrap();
        fs::write(store.root().join("beans-bad1.md"), "no front matter").unwrap();
        fs::write(store.root().join("README.md"), "# not a bean").unwrap();
        fs::create_dir_all(store.root().join("drafts")).unwrap();
        fs::write(store.root().join("drafts/beans-x.md"), "ignored").unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, PathBuf::from("beans-bad1.md"));
        assert_eq!(store.all().unwrap(), vec![good]);
    }

    #[test]
    fn test_load_reports_duplicate_ids() {
        let (_dir, store) = make_store();
        let created = store.create(make_bean("Twin")).unwrap();
        let copy = Path::new(ARCHIVE_DIR).join(created.file_name().unwrap());
        fs::copy(store.root().join(&created.path), store.root().join(&copy)).unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].path, copy);
        assert_eq!(store.get(&created.id).unwrap().path, created.path);
    }

    #[test]
    fn test_archived_beans_load_and_stay_addressable() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(".beans");
        let id = {
            let store = BeanStore::init(&root, Config::default()).unwrap();
            let created = store.create(make_bean("Old")).unwrap();
            store.archive(&created.id).unwrap();
            created.id
        };
        let reopened = BeanStore::open(&root, Config::default()).unwrap();
        assert!(reopened.get(&id).unwrap().is_archived());
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = BeanStore::open(dir.path().join("nope"), Config::default());
        assert!(matches!(result, Err(BeansError::Config(_))));
    }

    #[test]
    fn test_fix_broken_links_idempotent() {
        let (_dir, store) = make_store();
        let target = store.create(make_bean("Target")).unwrap();
        let mut bean = make_bean("Linker");
        bean.add_link(LinkType::Related, "beans-gone");
        bean.add_link(LinkType::Blocks, target.id.clone());
        let bean = store.create(bean).unwrap();
        let mut with_self = bean.clone();
        with_self.add_link(LinkType::Related, bean.id.clone());
        store.update(with_self, None).unwrap();

        assert_eq!(store.fix_broken_links().unwrap(), 2);
        assert_eq!(store.fix_broken_links().unwrap(), 0);
        let fixed = store.get(&bean.id).unwrap();
        assert_eq!(fixed.blocking(), vec![target.id.as_str()]);
        assert!(fixed.related().is_empty());
        assert!(store.check_all_links().unwrap().is_clean());
    }

    #[test]
    fn test_fix_leaves_cycles() {
        let (_dir, store) = make_store();
        let a = store.create(make_bean("A")).unwrap();
        let mut b = make_bean("B");
        b.add_link(LinkType::Blocks, a.id.clone());
        let b = store.create(b).unwrap();
        let mut a_edit = a.clone();
        a_edit.add_link(LinkType::Blocks, b.id.clone());
        store.update(a_edit, None).unwrap();

        assert_eq!(store.fix_broken_links().unwrap(), 0);
        assert_eq!(store.check_all_links().unwrap().cycles.len(), 1);
        assert!(store
            .detect_cycle(&a.id, &LinkType::Blocks, &b.id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_remove_links_to_before_delete() {
        let (_dir, store) = make_store();
        let target = store.create(make_bean("Target")).unwrap();
        let mut child = make_bean("Child");
        child.add_link(LinkType::Parent, target.id.clone());
        let child = store.create(child).unwrap();
        let mut other = make_bean("Other");
        other.add_link(LinkType::Related, target.id.clone());
        other.add_link(LinkType::Blocks, target.id.clone());
        let other = store.create(other).unwrap();

        let incoming = store.find_incoming_links(&target.id).unwrap();
        assert_eq!(incoming.len(), 3);

        let (deleted, removed) = store.delete_with_links(&target.id).unwrap();
        assert_eq!(deleted.id, target.id);
        assert_eq!(removed, 3);
        assert!(store.check_all_links().unwrap().broken.is_empty());
        assert!(store.get(&child.id).unwrap().parent().is_none());
        assert!(store.get(&other.id).unwrap().links.is_empty());
    }

    #[test]
    fn test_gitflow_disabled_sync() {
        let (_dir, store) = make_store();
        assert!(!store.is_gitflow_enabled());
        assert!(matches!(store.sync_gitflow(), Err(BeansError::GitFlowDisabled)));
    }

    #[test]
    fn test_reconcile_classifies_paths() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BeanStore::init(dir.path().join(".beans"), Config::default()).unwrap());
        let kept = store.create(make_bean("Kept")).unwrap();
        let gone = store.create(make_bean("Gone")).unwrap();

        // External edit, external delete, external create, and an echo.
        let mut edited = kept.clone();
        edited.body = "edited elsewhere".into();
        codec::write_atomic(&store.root().join(&kept.path), &codec::encode(&edited).unwrap()).unwrap();
        fs::remove_file(store.root().join(&gone.path)).unwrap();
        let mut fresh = make_bean("Fresh");
        fresh.id = "beans-new1".into();
        fresh.path = PathBuf::from("beans-new1.md");
        codec::write_atomic(&store.root().join(&fresh.path), &codec::encode(&fresh).unwrap()).unwrap();

        let paths: BTreeSet<PathBuf> = [&kept.path, &gone.path, &fresh.path]
            .into_iter()
            .map(|p| store.root().join(p))
            .chain([store.root().join("notes.txt")])
            .collect();
        let events = store.reconcile(&paths).unwrap();

        let kinds: BTreeMap<String, ChangeKind> =
            events.iter().map(|e| (e.id.clone(), e.kind)).collect();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[&kept.id], ChangeKind::Updated);
        assert_eq!(kinds[&gone.id], ChangeKind::Deleted);
        assert_eq!(kinds["beans-new1"], ChangeKind::Created);
        assert_eq!(store.get(&kept.id).unwrap().body, "edited elsewhere");

        // Reconciling again finds nothing new.
        assert!(store.reconcile(&paths).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_reports_external_archive_move_once() {
        let dir = TempDir::new().unwrap();
        let store = BeanStore::init(dir.path().join(".beans"), Config::default()).unwrap();
        let bean = store.create(make_bean("Moved by hand")).unwrap();

        let archived = Path::new(ARCHIVE_DIR).join(&bean.path);
        fs::rename(store.root().join(&bean.path), store.root().join(&archived)).unwrap();

        let paths: BTreeSet<PathBuf> = [&bean.path, &archived]
            .into_iter()
            .map(|p| store.root().join(p))
            .collect();
        let events = store.reconcile(&paths).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Updated);
        assert_eq!(events[0].id, bean.id);
        let current = store.get(&bean.id).unwrap();
        assert_eq!(current.path, archived);
        assert!(current.is_archived());
    }

    #[test]
    fn test_custom_link_type_is_canonical_on_disk() {
        let (_dir, store) = make_store();
        let target = store.create(make_bean("Target")).unwrap();
        let mut bean = make_bean("Mentions target");
        bean.add_link(LinkType::Custom("Mentions".into()), target.id.clone());
        let created = store.create(bean).unwrap();

        assert_eq!(created.links[0].link_type, LinkType::Custom("mentions".into()));
        let on_disk = codec::read_bean(store.root(), &created.path).unwrap();
        assert_eq!(on_disk, created);

        // A rewrite of the same content is not reported as a change.
        let paths: BTreeSet<PathBuf> = [store.root().join(&created.path)].into_iter().collect();
        assert!(store.reconcile(&paths).unwrap().is_empty());
    }
}
