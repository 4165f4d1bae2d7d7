//! Prefix tree over multi-byte key codes.
//!
//! Terminal keys such as the arrows arrive as escape sequences (`ESC O A`).
//! Splitting one across a typing pause or a mode switch desynchronizes the
//! shell's input parser, so playback asks the tree how many bytes at the
//! cursor belong together.

use std::collections::BTreeMap;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: BTreeMap<u8, NodeId>,
}

impl Node {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            children: BTreeMap::new(),
        }
    }
}

/// Byte-level trie stored as an arena; node `0` is the root.
#[derive(Debug, Clone)]
pub struct KeyTree {
    nodes: Vec<Node>,
}

/// A leaf reached by [`KeyTree::matches`].
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    tree: &'a KeyTree,
    node: NodeId,
}

impl Match<'_> {
    /// Number of edges between the root and this node, counted by walking
    /// parent links.
    pub fn depth(&self) -> usize {
        let mut count = 0;
        let mut current = self.tree.nodes[self.node].parent;
        while let Some(id) = current {
            count += 1;
            current = self.tree.nodes[id].parent;
        }
        count
    }
}

impl Default for KeyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTree {
    /// Sequences produced by common terminals for editing and cursor keys.
    pub const DEFAULT_SEQUENCES: &'static [&'static [u8]] = &[
        b"\x7f",    // backspace
        b"\x1bOA",  // up
        b"\x1bOB",  // down
        b"\x1bOC",  // right
        b"\x1bOD",  // left
        b"\x1b[2~", // insert
        b"\x1bOH",  // home
        b"\x1b[5~", // page up
        b"\x1b[3~", // delete
        b"\x1bOF",  // end
        b"\x1b[6~", // page down
    ];

    /// An empty tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(None)],
        }
    }

    /// A tree preloaded with [`DEFAULT_SEQUENCES`](Self::DEFAULT_SEQUENCES).
    pub fn with_default_sequences() -> Self {
        let mut tree = Self::new();
        for sequence in Self::DEFAULT_SEQUENCES {
            tree.add(sequence);
        }
        tree
    }

    /// Insert `sequence`, returning how many nodes had to be created.
    ///
    /// Re-inserting a sequence that is already present returns `0`.
    pub fn add(&mut self, sequence: &[u8]) -> usize {
        let mut added = 0;
        let mut current = ROOT;
        for &byte in sequence {
            current = match self.nodes[current].children.get(&byte) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new(Some(current)));
                    self.nodes[current].children.insert(byte, child);
                    added += 1;
                    child
                }
            };
        }
        added
    }

    /// Follow `input` from the root until a leaf is reached.
    ///
    /// Returns `None` when `input` runs out before a leaf or a byte has no
    /// matching child. An empty tree matches every input at depth zero.
    pub fn matches(&self, input: &[u8]) -> Option<Match<'_>> {
        let mut current = ROOT;
        let mut bytes = input.iter();
        loop {
            let node = &self.nodes[current];
            if node.children.is_empty() {
                return Some(Match {
                    tree: self,
                    node: current,
                });
            }
            let byte = bytes.next()?;
            current = *node.children.get(byte)?;
        }
    }

    /// Number of bytes at the start of `input` that form one known key, if any.
    pub fn key_len(&self, input: &[u8]) -> Option<usize> {
        self.matches(input)
            .map(|m| m.depth())
            .filter(|&depth| depth > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_counts_new_nodes() {
        let mut tree = KeyTree::new();
        assert_eq!(tree.add(b"string"), 6);
        assert_eq!(tree.add(b"sting"), 3);
        assert_eq!(tree.add(b"string"), 0);
    }

    #[test]
    fn test_prefix_matching() {
        let mut prefixes = KeyTree::new();
        prefixes.add(b"pre");
        prefixes.add(b"re");
        prefixes.add(b"post");

        assert_eq!(prefixes.matches(b"prefix").unwrap().depth(), 3);
        assert_eq!(prefixes.matches(b"postfix").unwrap().depth(), 4);
        assert_eq!(prefixes.matches(b"reflex").unwrap().depth(), 2);
        assert!(prefixes.matches(b"suffix").is_none());
    }

    #[test]
    fn test_input_exhausted_before_leaf() {
        let mut tree = KeyTree::new();
        tree.add(b"\x1bOA");
        assert!(tree.matches(b"\x1bO").is_none());
        assert!(tree.matches(b"").is_none());
    }

    #[test]
    fn test_depth_of_long_sequence() {
        let tree = KeyTree::with_default_sequences();
        let m = tree.matches(b"\x1b[5~ tail").unwrap();
        assert_eq!(m.depth(), 4);
    }

    #[test]
    fn test_default_sequences() {
        let tree = KeyTree::with_default_sequences();
        for sequence in KeyTree::DEFAULT_SEQUENCES {
            let mut input = sequence.to_vec();
            input.extend_from_slice(b"ls -l");
            assert_eq!(tree.key_len(&input), Some(sequence.len()));
        }
        assert_eq!(tree.key_len(b"ls -l"), None);
        assert_eq!(tree.key_len(b"\x1b"), None);
    }
}
