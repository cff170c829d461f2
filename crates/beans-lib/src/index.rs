//! In-memory index of beans keyed by id.
//!
//! The index is a plain `HashMap`; [`crate::store::BeanStore`] wraps it in a
//! `RwLock` and is the only writer.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{BeansError, Result};
use crate::ids::format_id;
use crate::model::{Bean, LinkType};

#[derive(Debug, Default, Clone)]
pub struct BeanIndex {
    beans: HashMap<String, Bean>,
}

impl BeanIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.beans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Bean> {
        self.beans.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.beans.contains_key(id)
    }

    /// Insert or replace, returning the previous bean with the same id.
    pub fn insert(&mut self, bean: Bean) -> Option<Bean> {
        self.beans.insert(bean.id.clone(), bean)
    }

    pub fn remove(&mut self, id: &str) -> Option<Bean> {
        self.beans.remove(id)
    }

    pub fn clear(&mut self) {
        self.beans.clear();
    }

    /// Beans in hash-map iteration order.
    pub fn values(&self) -> impl Iterator<Item = &Bean> {
        self.beans.values()
    }

    /// Owned copy of every bean, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Bean> {
        let mut beans: Vec<Bean> = self.beans.values().cloned().collect();
        beans.sort_by(|a, b| a.id.cmp(&b.id));
        beans
    }

    /// Bean whose file lives at `rel_path`.
    #[must_use]
    pub fn find_by_path(&self, rel_path: &Path) -> Option<&Bean> {
        self.beans.values().find(|b| b.path == rel_path)
    }

    // ========================================================================
    // ID Resolution
    // ========================================================================

    /// Resolve user input to a full id.
    ///
    /// Tries the exact id and the prefix-expanded short id. When both exist
    /// as different beans the input is ambiguous.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `AmbiguousId`.
    pub fn resolve(&self, input: &str, prefix: &str) -> Result<String> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return Err(BeansError::not_found(input));
        }

        let mut matches = Vec::with_capacity(2);
        if self.beans.contains_key(&input) {
            matches.push(input.clone());
        }
        if !prefix.is_empty() {
            let expanded = format_id(prefix, &input);
            if expanded != input && self.beans.contains_key(&expanded) {
                matches.push(expanded);
            }
        }

        match matches.len() {
            0 => Err(BeansError::not_found(input)),
            1 => Ok(matches.swap_remove(0)),
            _ => Err(BeansError::AmbiguousId {
                partial: input,
                matches,
            }),
        }
    }

    // ========================================================================
    // Reverse Links
    // ========================================================================

    /// Every `(from_id, link_type)` whose edge points at `target`, sorted.
    #[must_use]
    pub fn incoming(&self, target: &str) -> Vec<(String, LinkType)> {
        let mut found: Vec<(String, LinkType)> = self
            .beans
            .values()
            .flat_map(|bean| {
                bean.links
                    .iter()
                    .filter(|l| l.target == target)
                    .map(|l| (bean.id.clone(), l.link_type.clone()))
            })
            .collect();
        found.sort();
        found
    }

    /// True when another bean names `id` as its parent.
    #[must_use]
    pub fn has_children(&self, id: &str) -> bool {
        self.beans
            .values()
            .any(|b| b.id != id && b.parent() == Some(id))
    }
}
