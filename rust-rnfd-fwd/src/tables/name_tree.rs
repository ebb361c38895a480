//! The name tree: shared index underlying FIB and PIT.
//!
//! Nodes are keyed by the *stripped* form of a name (reflexive components
//! removed), which is what makes every reflexive-aware lookup a plain map
//! walk over prefixes. The arena owns the nodes; FIB entries live inside
//! their node and PIT entries are referenced by id, never by pointer.

use crate::tables::fib::FibEntry;
use crate::tables::pit::PitEntryId;
use rust_rnfd_common::Name;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct Node {
    pub name: Name,
    parent: Option<NodeId>,
    children: usize,
    pub fib: Option<FibEntry>,
    pub pit_entries: Vec<PitEntryId>,
}

impl Node {
    fn new(name: Name, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: 0,
            fib: None,
            pit_entries: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.fib.is_none() && self.pit_entries.is_empty() && self.children == 0
    }
}

#[derive(Debug)]
pub struct NameTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    lookup: HashMap<Name, NodeId>,
    root: NodeId,
}

impl NameTree {
    pub fn new() -> Self {
        let root_name = Name::new();
        let root = NodeId(0);
        let mut lookup = HashMap::new();
        lookup.insert(root_name.clone(), root);
        Self {
            nodes: vec![Some(Node::new(root_name, None))],
            free: Vec::new(),
            lookup,
            root,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("stale NodeId")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("stale NodeId")
    }

    /// Looks up the node for `name`, stripping reflexive components first.
    pub fn find(&self, name: &Name) -> Option<NodeId> {
        self.lookup.get(&name.strip_reflexive()).copied()
    }

    /// Finds or creates the node for `name` (stripped), creating every
    /// missing ancestor on the way down.
    pub fn find_or_insert(&mut self, name: &Name) -> NodeId {
        let stripped = name.strip_reflexive();
        let mut current = self.root;
        for k in 1..=stripped.len() {
            let prefix = stripped.get_prefix(k as isize);
            current = match self.lookup.get(&prefix) {
                Some(&id) => id,
                None => {
                    let id = self.allocate(Node::new(prefix.clone(), Some(current)));
                    self.node_mut(current).children += 1;
                    self.lookup.insert(prefix, id);
                    id
                }
            };
        }
        current
    }

    /// Walks every existing node whose name is a prefix of `name`
    /// (stripped), shortest first, including the root.
    pub fn prefixes_of(&self, name: &Name) -> Vec<NodeId> {
        let stripped = name.strip_reflexive();
        let mut out = Vec::with_capacity(stripped.len() + 1);
        for k in 0..=stripped.len() {
            if let Some(&id) = self.lookup.get(&stripped.get_prefix(k as isize)) {
                out.push(id);
            }
        }
        out
    }

    /// Drops `id` and any newly-empty ancestors. The root is never removed.
    pub fn prune_if_empty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(id) = current {
            if id == self.root || !self.node(id).is_empty() {
                break;
            }
            let node = self.nodes[id.0].take().expect("stale NodeId");
            self.lookup.remove(&node.name);
            self.free.push(id.0);
            if let Some(parent) = node.parent {
                self.node_mut(parent).children -= 1;
            }
            current = node.parent;
        }
    }

    /// Every live node, for management enumeration.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i), n)))
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }
}

impl Default for NameTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::pit::PitEntryId;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn insert_creates_ancestors() {
        let mut tree = NameTree::new();
        let id = tree.find_or_insert(&name("/a/b/c"));
        assert_eq!(tree.node(id).name, name("/a/b/c"));
        assert!(tree.find(&name("/a/b")).is_some());
        assert!(tree.find(&name("/a")).is_some());
    }

    #[test]
    fn reflexive_components_share_a_node() {
        let mut tree = NameTree::new();
        let reflexive = Name::from_uri_reflexive("/example/testApp/1234").unwrap();
        let id = tree.find_or_insert(&reflexive);
        assert_eq!(tree.node(id).name, name("/example/testApp"));
        assert_eq!(tree.find(&name("/example/testApp")), Some(id));
    }

    #[test]
    fn prefixes_walk_shortest_first() {
        let mut tree = NameTree::new();
        tree.find_or_insert(&name("/a/b"));
        let ids = tree.prefixes_of(&name("/a/b/c"));
        // root, /a, /a/b exist; /a/b/c does not
        assert_eq!(ids.len(), 3);
        assert_eq!(tree.node(ids[0]).name, Name::new());
        assert_eq!(tree.node(ids[2]).name, name("/a/b"));
    }

    #[test]
    fn prune_removes_empty_chains_only() {
        let mut tree = NameTree::new();
        let leaf = tree.find_or_insert(&name("/a/b/c"));
        let mid = tree.find(&name("/a/b")).unwrap();
        tree.node_mut(mid).pit_entries.push(PitEntryId(1));

        tree.prune_if_empty(leaf);
        assert!(tree.find(&name("/a/b/c")).is_none());
        assert!(tree.find(&name("/a/b")).is_some());

        tree.node_mut(mid).pit_entries.clear();
        tree.prune_if_empty(mid);
        assert!(tree.find(&name("/a/b")).is_none());
        assert!(tree.find(&name("/a")).is_none());
        // root survives
        assert!(tree.find(&Name::new()).is_some());
    }
}
