//! Link-graph integrity: broken links, self-links and cycles.
//!
//! Nodes are bean ids and edges are the per-bean link lists held in the
//! [`BeanIndex`]. Cycle checks only follow the configured hierarchical link
//! types, one type at a time.

use serde::Serialize;
use std::collections::HashSet;

use crate::index::BeanIndex;
use crate::model::LinkType;

/// Edge whose target is not in the index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BrokenLink {
    pub bean_id: String,
    pub link_type: LinkType,
    pub target: String,
}

/// Edge pointing back at its own bean.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SelfLink {
    pub bean_id: String,
    pub link_type: LinkType,
}

/// Cycle along edges of one hierarchical type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LinkCycle {
    pub link_type: LinkType,
    /// Rotation-invariant key, e.g. `a->b->c`.
    pub key: String,
    /// Nodes in the order they were traversed, without repeating the start.
    pub path: Vec<String>,
}

/// Result of a full link scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub broken: Vec<BrokenLink>,
    pub self_links: Vec<SelfLink>,
    pub cycles: Vec<LinkCycle>,
}

impl LinkReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.broken.is_empty() && self.self_links.is_empty() && self.cycles.is_empty()
    }

    /// Broken and self links; the issues `fix_broken_links` removes.
    #[must_use]
    pub fn repairable(&self) -> usize {
        self.broken.len() + self.self_links.len()
    }
}

/// Would adding `from --link_type--> to` close a cycle?
///
/// Returns the cycle as `[from, to, ..., from]`. Non-hierarchical types
/// never form cycles.
#[must_use]
pub fn detect_cycle(
    index: &BeanIndex,
    hierarchical: &[LinkType],
    from: &str,
    link_type: &LinkType,
    to: &str,
) -> Option<Vec<String>> {
    if !hierarchical.contains(link_type) {
        return None;
    }
    if from == to {
        return Some(vec![from.to_string(), to.to_string()]);
    }
    let back = find_path(index, link_type, to, from)?;
    let mut cycle = Vec::with_capacity(back.len() + 1);
    cycle.push(from.to_string());
    cycle.extend(back);
    Some(cycle)
}

/// DFS along `link_type` edges from `start`; returns `[start, ..., goal]`.
fn find_path(index: &BeanIndex, link_type: &LinkType, start: &str, goal: &str) -> Option<Vec<String>> {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.to_string());
    // (node, index of the next outgoing edge to try)
    let mut stack: Vec<(String, usize)> = vec![(start.to_string(), 0)];

    loop {
        let Some((node, next_edge)) = stack.last_mut() else {
            return None;
        };
        let next = index
            .get(node.as_str())
            .and_then(|bean| bean.links_of(link_type).nth(*next_edge))
            .map(str::to_owned);
        *next_edge += 1;

        match next {
            None => {
                stack.pop();
            }
            Some(next) if next == goal => {
                let mut path: Vec<String> = stack.into_iter().map(|(id, _)| id).collect();
                path.push(next);
                return Some(path);
            }
            Some(next) => {
                if visited.insert(next.clone()) {
                    stack.push((next, 0));
                }
            }
        }
    }
}

/// Rotate the cycle to start at its smallest id and join with `->`.
#[must_use]
pub fn canonical_cycle_key(nodes: &[String]) -> String {
    let Some((start, _)) = nodes.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)) else {
        return String::new();
    };
    nodes[start..]
        .iter()
        .chain(&nodes[..start])
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("->")
}

/// Scan every bean and edge once.
#[must_use]
pub fn check_all_links(index: &BeanIndex, hierarchical: &[LinkType]) -> LinkReport {
    let mut report = LinkReport::default();
    let mut seen_cycles: HashSet<(LinkType, String)> = HashSet::new();

    for bean in index.values() {
        for link in &bean.links {
            if link.target == bean.id {
                report.self_links.push(SelfLink {
                    bean_id: bean.id.clone(),
                    link_type: link.link_type.clone(),
                });
                continue;
            }
            if !index.contains(&link.target) {
                report.broken.push(BrokenLink {
                    bean_id: bean.id.clone(),
                    link_type: link.link_type.clone(),
                    target: link.target.clone(),
                });
                continue;
            }
            if !hierarchical.contains(&link.link_type) {
                continue;
            }
            if let Some(mut path) = detect_cycle(index, hierarchical, &bean.id, &link.link_type, &link.target) {
                path.pop();
                let key = canonical_cycle_key(&path);
                if seen_cycles.insert((link.link_type.clone(), key.clone())) {
                    report.cycles.push(LinkCycle {
                        link_type: link.link_type.clone(),
                        key,
                        path,
                    });
                }
            }
        }
    }

    report.broken.sort();
    report.self_links.sort();
    report.cycles.sort();
    report
}
