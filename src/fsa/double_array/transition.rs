//! The labeled transition function
//!
//! The child of `from` under `label` lives at `base[from] ^ label` and is
//! genuine only if its `check` names `from`. XOR keeps every child inside the
//! block of its parent's seed, so a parent's whole child set is one block.

use super::allocator::NodeStore;
use super::node::{is_free_at, Node, BASE_NONE, ROOT};

/// Follow one existing edge, read-only
///
/// Tolerates out-of-range seeds so that adopted buffers never cause a panic.
#[inline]
pub(crate) fn step(nodes: &[Node], from: usize, label: u8) -> Option<usize> {
    let base = nodes.get(from)?.base;
    if base < 0 {
        return None;
    }
    let to = base as usize ^ label as usize;
    let node = nodes.get(to)?;
    if to != ROOT && node.check >= 0 && node.check as usize == from {
        Some(to)
    } else {
        None
    }
}

impl NodeStore {
    /// The child of `from` under `label`, created if it does not exist yet
    pub fn next(&mut self, from: usize, label: u8) -> usize {
        let base = self.nodes[from].base;
        if base == BASE_NONE {
            let to = self.find_empty_node();
            self.nodes[from].base = (to ^ label as usize) as i32;
            self.claim(to, Node::leaf(from));
            return to;
        }

        let base = base as usize;
        let to = base ^ label as usize;
        if is_free_at(&self.nodes, to) {
            self.claim(to, Node::leaf(from));
            return to;
        }
        if self.nodes[to].check == from as i32 {
            return to;
        }

        let (from, base) = self.resolve_conflict(from, base, label);
        let to = base ^ label as usize;
        debug_assert!(
            is_free_at(&self.nodes, to),
            "slot {} still occupied after conflict resolution",
            to
        );
        self.claim(to, Node::leaf(from));
        to
    }

    /// Labels of the existing children of `parent`, whose seed is `base`
    pub fn children(&self, parent: usize, base: usize) -> Vec<u8> {
        (0..=u8::MAX)
            .filter(|&label| {
                let index = base ^ label as usize;
                index != ROOT
                    && self
                        .nodes
                        .get(index)
                        .map_or(false, |node| node.check == parent as i32)
            })
            .collect()
    }
}
