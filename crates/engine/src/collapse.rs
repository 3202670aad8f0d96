// reqdebug - Request-scoped debugging toolkit
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Collapse state of composite nodes
//!
//! Every non-empty composite entered during one traversal gets a fresh
//! [`CollapseId`]. The ids of all enclosing composites form a [`CollapseChain`], an
//! immutable list passed down the recursion: a child derives its chain by pushing
//! onto its parent's, and returning from a subtree simply drops the derived handle.

use std::fmt;

use rpds::Vector;

/// Identifier of one composite subtree, usable as a CSS class name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollapseId(String);

impl CollapseId {
    /// The id as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollapseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allocates collapse ids for one traversal
///
/// Ids combine a random salt with a counter, so they are unique within the
/// traversal and do not clash with ids of other dumps on the same page.
#[derive(Debug)]
pub struct CollapseIds {
    salt: u32,
    next: u32,
}

impl Default for CollapseIds {
    fn default() -> Self {
        Self::new()
    }
}

impl CollapseIds {
    /// Create an allocator with a random salt
    pub fn new() -> Self {
        Self::with_salt(rand::random())
    }

    /// Create an allocator with a fixed salt
    pub fn with_salt(salt: u32) -> Self {
        Self { salt, next: 0 }
    }

    /// Allocate the next id
    pub fn allocate(&mut self) -> CollapseId {
        let id = CollapseId(format!("dv{:08x}-{:x}", self.salt, self.next));
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChainEntry {
    id: CollapseId,
    collapsed: bool,
}

/// The collapse ids of all enclosing composites, outermost first
///
/// Each method returns a NEW chain sharing structure with the old one.
#[derive(Debug, Clone, Default)]
pub struct CollapseChain {
    entries: Vector<ChainEntry>,
}

impl CollapseChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self { entries: Vector::new() }
    }

    /// Number of enclosing composites
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no enclosing composites
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enter a composite, returning the chain for its children
    ///
    /// The composite starts collapsed when the chain including it reaches `threshold`.
    pub fn enter(&self, id: CollapseId, threshold: usize) -> Self {
        let collapsed = self.len() + 1 >= threshold;
        Self { entries: self.entries.push_back(ChainEntry { id, collapsed }) }
    }

    /// The innermost collapse id
    pub fn last(&self) -> Option<&CollapseId> {
        self.entries.last().map(|entry| &entry.id)
    }

    /// Whether the innermost composite starts collapsed
    pub fn is_last_collapsed(&self) -> bool {
        self.entries.last().is_some_and(|entry| entry.collapsed)
    }

    /// Whether any composite of the chain starts collapsed
    pub fn any_collapsed(&self) -> bool {
        self.entries.iter().any(|entry| entry.collapsed)
    }

    /// Ids of the chain, outermost first
    pub fn ids(&self) -> impl Iterator<Item = &CollapseId> + '_ {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// Convert the chain to a `Vec` of ids
    pub fn to_vec(&self) -> Vec<CollapseId> {
        self.ids().cloned().collect()
    }
}

/// Whether a composite with `chain_len` enclosing composites (itself included)
/// starts collapsed under `threshold`
pub fn is_initially_collapsed(chain_len: usize, threshold: usize) -> bool {
    chain_len >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let mut ids = CollapseIds::new();
        let allocated: HashSet<CollapseId> = (0..500).map(|_| ids.allocate()).collect();
        assert_eq!(allocated.len(), 500);
        assert_eq!(ids.allocated(), 500);
    }

    #[test]
    fn test_ids_are_css_class_names() {
        let mut ids = CollapseIds::with_salt(0xabc);
        assert_eq!(ids.allocate().as_str(), "dv00000abc-0");
        assert_eq!(ids.allocate().as_str(), "dv00000abc-1");
    }

    #[test]
    fn test_chain_is_persistent() {
        let mut ids = CollapseIds::with_salt(1);
        let root = CollapseChain::new();
        let a = root.enter(ids.allocate(), 3);
        let ab = a.enter(ids.allocate(), 3);
        let ac = a.enter(ids.allocate(), 3);

        assert!(root.is_empty());
        assert_eq!(a.len(), 1);
        assert_eq!(ab.len(), 2);
        assert_eq!(ab.to_vec()[0], ac.to_vec()[0]);
        assert_ne!(ab.last(), ac.last());
    }

    #[test]
    fn test_collapse_threshold() {
        let mut ids = CollapseIds::with_salt(2);
        for threshold in 0..5 {
            let mut chain = CollapseChain::new();
            for depth in 1..=6 {
                chain = chain.enter(ids.allocate(), threshold);
                assert_eq!(chain.is_last_collapsed(), depth >= threshold);
                assert_eq!(chain.is_last_collapsed(), is_initially_collapsed(depth, threshold));
            }
        }

        let everything = CollapseChain::new().enter(ids.allocate(), 0);
        assert!(everything.any_collapsed());
    }
}
