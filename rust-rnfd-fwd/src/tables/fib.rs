//! The Forwarding Information Base.
//!
//! Entries live inside their NameTree node; nexthop lists stay sorted
//! ascending by cost so strategies can take the first eligible hop.

use crate::tables::name_tree::{NameTree, NodeId};
use log::debug;
use rust_rnfd_common::types::FaceId;
use rust_rnfd_common::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub face: FaceId,
    pub cost: u64,
}

#[derive(Debug, Clone)]
pub struct FibEntry {
    pub prefix: Name,
    pub nexthops: Vec<NextHop>,
}

#[derive(Debug, Default)]
pub struct Fib {
    n_items: usize,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    /// Adds or re-costs a nexthop under `prefix`, creating the entry when
    /// needed. Returns true when the (prefix, face) pair is new.
    pub fn add_or_update_nexthop(
        &mut self,
        tree: &mut NameTree,
        prefix: &Name,
        face: FaceId,
        cost: u64,
    ) -> bool {
        let node = tree.find_or_insert(prefix);
        let entry = tree.node_mut(node).fib.get_or_insert_with(|| {
            debug!("fib insert prefix={}", prefix);
            FibEntry {
                prefix: prefix.strip_reflexive(),
                nexthops: Vec::new(),
            }
        });
        if entry.nexthops.is_empty() {
            self.n_items += 1;
        }

        let is_new = match entry.nexthops.iter_mut().find(|h| h.face == face) {
            Some(hop) => {
                hop.cost = cost;
                false
            }
            None => {
                entry.nexthops.push(NextHop { face, cost });
                true
            }
        };
        entry.nexthops.sort_by_key(|h| h.cost);
        is_new
    }

    /// Removes the nexthop; an entry left without nexthops is erased.
    pub fn remove_nexthop(&mut self, tree: &mut NameTree, prefix: &Name, face: FaceId) -> bool {
        let Some(node) = tree.find(prefix) else {
            return false;
        };
        let Some(entry) = tree.node_mut(node).fib.as_mut() else {
            return false;
        };
        let before = entry.nexthops.len();
        entry.nexthops.retain(|h| h.face != face);
        let removed = entry.nexthops.len() != before;
        if entry.nexthops.is_empty() {
            self.erase_node(tree, node);
        }
        removed
    }

    pub fn erase(&mut self, tree: &mut NameTree, prefix: &Name) {
        if let Some(node) = tree.find(prefix) {
            if tree.node(node).fib.is_some() {
                self.erase_node(tree, node);
            }
        }
    }

    /// Longest-prefix match over the stripped form of `name`.
    pub fn find_longest_prefix_match<'t>(
        &self,
        tree: &'t NameTree,
        name: &Name,
    ) -> Option<&'t FibEntry> {
        tree.prefixes_of(name)
            .into_iter()
            .rev()
            .find_map(|node| tree.node(node).fib.as_ref())
    }

    /// Drops `face` from every entry; entries left empty are erased.
    pub fn remove_face(&mut self, tree: &mut NameTree, face: FaceId) {
        let touched: Vec<NodeId> = tree
            .iter()
            .filter(|(_, node)| {
                node.fib
                    .as_ref()
                    .is_some_and(|e| e.nexthops.iter().any(|h| h.face == face))
            })
            .map(|(id, _)| id)
            .collect();

        for node in touched {
            let emptied = {
                let entry = tree.node_mut(node).fib.as_mut().expect("checked above");
                entry.nexthops.retain(|h| h.face != face);
                entry.nexthops.is_empty()
            };
            if emptied {
                self.erase_node(tree, node);
            }
        }
    }

    /// Every live entry, for management enumeration.
    pub fn entries<'t>(&self, tree: &'t NameTree) -> Vec<&'t FibEntry> {
        tree.iter().filter_map(|(_, node)| node.fib.as_ref()).collect()
    }

    fn erase_node(&mut self, tree: &mut NameTree, node: NodeId) {
        if let Some(entry) = tree.node_mut(node).fib.take() {
            debug!("fib erase prefix={}", entry.prefix);
            self.n_items = self.n_items.saturating_sub(1);
        }
        tree.prune_if_empty(node);
    }
}
