//! Core data types for beans-lib.
//!
//! A [`Bean`] is one issue file. Its relationships are a single ordered edge
//! list of [`Link`]s; the typed accessors (`parent()`, `blocking()`, ...) are
//! projections over that list.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{BeansError, Result};
use crate::ids::ARCHIVE_DIR;

/// Bean lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Draft,
    #[default]
    Todo,
    InProgress,
    Completed,
    Scrapped,
    #[serde(untagged)]
    Custom(String),
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Scrapped => "scrapped",
            Self::Custom(value) => value,
        }
    }

    /// Completed and scrapped beans take no further lifecycle transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Scrapped)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = BeansError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "draft" => Ok(Self::Draft),
            "todo" => Ok(Self::Todo),
            "in-progress" | "in_progress" | "inprogress" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            "scrapped" => Ok(Self::Scrapped),
            "" => Err(BeansError::InvalidStatus { status: value }),
            _ => Ok(Self::Custom(value)),
        }
    }
}

/// Bean type category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BeanType {
    Milestone,
    Epic,
    Feature,
    Bug,
    #[default]
    Task,
    #[serde(untagged)]
    Custom(String),
}

impl BeanType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Milestone => "milestone",
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Task => "task",
            Self::Custom(value) => value,
        }
    }
}

impl fmt::Display for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BeanType {
    type Err = BeansError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "milestone" => Ok(Self::Milestone),
            "epic" => Ok(Self::Epic),
            "feature" => Ok(Self::Feature),
            "bug" => Ok(Self::Bug),
            "task" => Ok(Self::Task),
            "" => Err(BeansError::InvalidType { bean_type: value }),
            _ => Ok(Self::Custom(value)),
        }
    }
}

/// Bean priority, most urgent first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
    Deferred,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Deferred => "deferred",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = BeansError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            "deferred" => Ok(Self::Deferred),
            other => Err(BeansError::InvalidPriority {
                priority: other.to_string(),
            }),
        }
    }
}

/// Relationship type carried by a [`Link`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkType {
    Parent,
    Milestone,
    Blocks,
    Related,
    Duplicates,
    Custom(String),
}

impl LinkType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Parent => "parent",
            Self::Milestone => "milestone",
            Self::Blocks => "blocks",
            Self::Related => "related",
            Self::Duplicates => "duplicates",
            Self::Custom(value) => value,
        }
    }

    /// Name as written to disk. Custom names are stored lowercased.
    #[must_use]
    pub fn file_key(&self) -> Cow<'_, str> {
        match self {
            Self::Custom(value) => Cow::Owned(value.trim().to_lowercase()),
            other => Cow::Borrowed(other.as_str()),
        }
    }

    /// The form this type takes after a trip through a file.
    #[must_use]
    pub fn canonical(&self) -> Self {
        match self {
            Self::Custom(value) => Self::from(value.as_str()),
            other => other.clone(),
        }
    }

    /// Single-target types keep at most one edge per bean.
    #[must_use]
    pub const fn is_single_target(&self) -> bool {
        matches!(self, Self::Parent | Self::Milestone)
    }
}

impl From<&str> for LinkType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "parent" => Self::Parent,
            "milestone" => Self::Milestone,
            "blocks" | "blocking" => Self::Blocks,
            "related" => Self::Related,
            "duplicates" => Self::Duplicates,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl FromStr for LinkType {
    type Err = BeansError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(BeansError::validation("link_type", "must not be empty"));
        }
        Ok(Self::from(s))
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for LinkType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.file_key())
    }
}

impl<'de> Deserialize<'de> for LinkType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from(value.as_str()))
    }
}

/// One outgoing relationship edge: `(link_type, target)`.
///
/// On disk each edge is a single-key map, e.g. `- parent: beans-ab12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub link_type: LinkType,
    pub target: String,
}

impl Link {
    #[must_use]
    pub fn new(link_type: LinkType, target: impl Into<String>) -> Self {
        Self {
            link_type,
            target: target.into(),
        }
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.link_type.file_key().as_ref(), &self.target)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut iter = entries.into_iter();
        match (iter.next(), iter.next()) {
            (Some((link_type, target)), None) => Ok(Self {
                link_type: LinkType::from(link_type.as_str()),
                target,
            }),
            _ => Err(serde::de::Error::custom(
                "link must be a single `type: target` entry",
            )),
        }
    }
}

/// Normalize a tag: trimmed, lowercased, inner whitespace runs become `-`.
///
/// Returns `None` for tags that are empty after trimming.
#[must_use]
pub fn normalize_tag(tag: &str) -> Option<String> {
    let joined = tag
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if joined.is_empty() { None } else { Some(joined) }
}

/// Normalize a tag list into a sorted, deduplicated set.
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = tags
        .into_iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect();
    out.sort();
    out.dedup();
    out
}

/// The primary bean entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bean {
    /// Immutable identifier, e.g. `beans-ab12`.
    pub id: String,
    /// Title-derived slug carried in the filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Location relative to the store root.
    pub path: PathBuf,

    pub title: String,
    pub status: Status,
    #[serde(rename = "type")]
    pub bean_type: BeanType,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Git flow metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_created_at: Option<DateTime<Utc>>,
    /// Base commit the branch forked from; a tip still here has no work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_fork_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_merged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_merge_commit: Option<String>,
}

impl Default for Bean {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            slug: None,
            path: PathBuf::new(),
            title: String::new(),
            status: Status::default(),
            bean_type: BeanType::default(),
            priority: Priority::default(),
            tags: Vec::new(),
            links: Vec::new(),
            body: String::new(),
            created_at: now,
            updated_at: now,
            git_branch: None,
            git_created_at: None,
            git_fork_commit: None,
            git_merged_at: None,
            git_merge_commit: None,
        }
    }
}

impl Bean {
    /// New unsaved bean with the given title; the store assigns the id.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Fingerprint of the bean's rendered file content.
    pub fn etag(&self) -> Result<String> {
        crate::etag::for_bean(self)
    }

    /// True when the file lives under `archive/`.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.path.starts_with(ARCHIVE_DIR)
    }

    /// Filename without directory.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Branch name used by git flow: `{id}/{slug}` or `{id}`.
    #[must_use]
    pub fn branch_name(&self) -> String {
        match self.slug.as_deref() {
            Some(slug) if !slug.is_empty() => format!("{}/{}", self.id, slug),
            _ => self.id.clone(),
        }
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Targets of every edge of `link_type`, in edge-list order.
    pub fn links_of<'a>(&'a self, link_type: &LinkType) -> impl Iterator<Item = &'a str> + use<'a> {
        let link_type = link_type.clone();
        self.links
            .iter()
            .filter(move |l| l.link_type == link_type)
            .map(|l| l.target.as_str())
    }

    #[must_use]
    pub fn has_link(&self, link_type: &LinkType, target: &str) -> bool {
        self.links
            .iter()
            .any(|l| &l.link_type == link_type && l.target == target)
    }

    /// Add an edge. Single-target types replace any existing edge of the
    /// same type. Returns false when the exact edge already exists.
    pub fn add_link(&mut self, link_type: LinkType, target: impl Into<String>) -> bool {
        let target = target.into();
        if self.has_link(&link_type, &target) {
            return false;
        }
        if link_type.is_single_target() {
            self.links.retain(|l| l.link_type != link_type);
        }
        self.links.push(Link::new(link_type, target));
        true
    }

    /// Set or clear a single-target edge.
    pub fn set_link(&mut self, link_type: LinkType, target: Option<&str>) {
        self.links.retain(|l| l.link_type != link_type);
        if let Some(target) = target {
            self.links.push(Link::new(link_type, target));
        }
    }

    /// Remove the exact edge. Returns true when something was removed.
    pub fn remove_link(&mut self, link_type: &LinkType, target: &str) -> bool {
        let before = self.links.len();
        self.links
            .retain(|l| !(&l.link_type == link_type && l.target == target));
        self.links.len() != before
    }

    /// Remove every edge pointing at `target`, returning how many went.
    pub fn remove_links_to(&mut self, target: &str) -> usize {
        let before = self.links.len();
        self.links.retain(|l| l.target != target);
        before - self.links.len()
    }

    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.links_of(&LinkType::Parent).next()
    }

    #[must_use]
    pub fn milestone(&self) -> Option<&str> {
        self.links_of(&LinkType::Milestone).next()
    }

    #[must_use]
    pub fn blocking(&self) -> Vec<&str> {
        self.links_of(&LinkType::Blocks).collect()
    }

    #[must_use]
    pub fn related(&self) -> Vec<&str> {
        self.links_of(&LinkType::Related).collect()
    }

    #[must_use]
    pub fn duplicates(&self) -> Vec<&str> {
        self.links_of(&LinkType::Duplicates).collect()
    }

    // ========================================================================
    // Tags
    // ========================================================================

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        normalize_tag(tag).is_some_and(|t| self.tags.contains(&t))
    }

    /// Returns false when the tag is empty or already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        match self.tags.binary_search(&tag) {
            Ok(_) => false,
            Err(pos) => {
                self.tags.insert(pos, tag);
                true
            }
        }
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        let before = self.tags.len();
        self.tags.retain(|t| t != &tag);
        self.tags.len() != before
    }

    /// Re-normalize the tag set in place.
    pub fn normalize_tags(&mut self) {
        self.tags = normalize_tags(&self.tags);
    }

    /// Canonical tags and link types, matching what a reload would produce.
    pub fn normalize(&mut self) {
        self.normalize_tags();
        for link in &mut self.links {
            link.link_type = link.link_type.canonical();
        }
    }

    /// Directory the file lives in, relative to the store root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}
