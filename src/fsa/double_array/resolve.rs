//! Conflict resolution by child-set relocation
//!
//! A conflict happens when the slot a new edge needs is held by a child of a
//! different parent. One of the two child sets moves to a fresh range of
//! free nodes; the smaller one moves, ties going to the occupant.

use log::trace;

use super::allocator::NodeStore;
use super::node::{Node, VALUE_LABEL};

impl NodeStore {
    /// Free the slot `base ^ label` for a new child of `from`
    ///
    /// Returns the index of `from`, which changes when `from` itself belonged
    /// to the relocated child set, and the seed under which the new child must
    /// be placed.
    pub fn resolve_conflict(&mut self, from: usize, base: usize, label: u8) -> (usize, usize) {
        let slot = base ^ label as usize;
        let occupant_parent = self.nodes[slot].check as usize;
        let occupant_base = self.nodes[occupant_parent].base as usize;

        let own = self.children(from, base);
        let theirs = self.children(occupant_parent, occupant_base);

        if theirs.len() <= own.len() + 1 {
            trace!(
                "slot {}: moving {} children of node {} out of the way of node {}",
                slot,
                theirs.len(),
                occupant_parent,
                from
            );
            let new_base = self.find_empty_range(&theirs);
            let from = self.move_children(occupant_parent, occupant_base, new_base, &theirs, from);
            (from, base)
        } else {
            trace!(
                "slot {}: moving {} children of node {} away from node {}",
                slot,
                own.len() + 1,
                from,
                occupant_parent
            );
            let mut labels = own.clone();
            labels.push(label);
            let new_base = self.find_empty_range(&labels);
            let from = self.move_children(from, base, new_base, &own, from);
            (from, new_base)
        }
    }

    /// Relocate the children of `parent` from `old_base` to `new_base`
    ///
    /// Each child record is copied into its new slot, its own children are
    /// repointed at the new index, and the old slot is freed. Returns the
    /// current index of the node that was at `watch`.
    fn move_children(
        &mut self,
        parent: usize,
        old_base: usize,
        new_base: usize,
        labels: &[u8],
        watch: usize,
    ) -> usize {
        let mut watched = watch;
        for &label in labels {
            let old = old_base ^ label as usize;
            let new = new_base ^ label as usize;
            let record = self.nodes[old];
            self.claim(new, Node::new(record.base, parent as i32));

            // a value child's base is a payload, not a seed
            if label != VALUE_LABEL && record.base >= 0 {
                let seed = record.base as usize;
                for grandchild_label in 0..=u8::MAX as usize {
                    let grandchild = seed ^ grandchild_label;
                    if let Some(node) = self.nodes.get_mut(grandchild) {
                        if node.check == old as i32 {
                            node.check = new as i32;
                        }
                    }
                }
            }

            self.release(old);
            if old == watched {
                watched = new;
            }
        }
        self.nodes[parent].base = new_base as i32;
        watched
    }
}
