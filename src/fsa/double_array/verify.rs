//! Structural auditor
//!
//! Walks the whole array and reports the first broken invariant. O(size);
//! meant for tests and for validating untrusted files, not for hot paths.

use log::debug;

use super::allocator::NodeStore;
use super::block::BlockList;
use super::node::{block_of, is_free_at, Node, BASE_NONE, BLOCK_SHIFT, BLOCK_SIZE, ROOT, ROOT_CHECK};
use super::{DoubleArrayTrie, Storage};
use crate::error::{DatError, Result};

impl DoubleArrayTrie<'_> {
    /// Audit the structure, returning `false` on the first broken invariant
    ///
    /// The failure itself is logged at debug level; use
    /// [`verify`](Self::verify) to get it as an error.
    pub fn check(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(err) => {
                debug!("double array audit failed: {}", err);
                false
            }
        }
    }

    /// Audit the structure, reporting the first broken invariant
    ///
    /// Block bookkeeping is only checked once it exists, i.e. for tries that
    /// were built in memory or have been modified since loading.
    pub fn verify(&self) -> Result<()> {
        verify_nodes(self.array())?;
        if let Storage::Owned(store) = &self.storage {
            if store.indexed {
                verify_blocks(store)?;
            }
        }
        Ok(())
    }
}

/// Check the node-level invariants of `nodes`
pub(crate) fn verify_nodes(nodes: &[Node]) -> Result<()> {
    if nodes.is_empty() {
        return Ok(());
    }
    let len = nodes.len();
    if len % BLOCK_SIZE != 0 {
        return Err(DatError::corruption(format!(
            "{} nodes is not a whole number of blocks",
            len
        )));
    }

    let root = nodes[ROOT];
    if root.check != ROOT_CHECK {
        return Err(DatError::corruption(format!(
            "root check is {}, expected {}",
            root.check, ROOT_CHECK
        )));
    }
    if root.base != BASE_NONE && (root.base < 0 || root.base as usize >= len) {
        return Err(DatError::corruption(format!("root seed {} out of range", root.base)));
    }

    for index in 1..len {
        let node = nodes[index];
        if node.is_free_record() {
            verify_free_link(nodes, index)?;
            continue;
        }

        let parent = node.check as usize;
        if parent >= len || parent == index {
            return Err(DatError::corruption(format!(
                "node {} has invalid parent {}",
                index, parent
            )));
        }
        let parent_node = nodes[parent];
        if is_free_at(nodes, parent) {
            return Err(DatError::corruption(format!(
                "node {} hangs off free node {}",
                index, parent
            )));
        }
        if parent_node.base < 0 {
            return Err(DatError::corruption(format!(
                "node {} claims parent {} which has no child seed",
                index, parent
            )));
        }
        let label = index ^ parent_node.base as usize;
        if label > u8::MAX as usize {
            return Err(DatError::corruption(format!(
                "node {} is not addressable from parent {}",
                index, parent
            )));
        }
        if parent != ROOT {
            let grandparent = parent_node.check as usize;
            let parent_is_value = nodes
                .get(grandparent)
                .map_or(false, |g| g.base >= 0 && g.base as usize == parent);
            if parent_is_value {
                return Err(DatError::corruption(format!(
                    "node {} hangs off value node {}",
                    index, parent
                )));
            }
        }
        if label != 0 && node.base != BASE_NONE && (node.base < 0 || node.base as usize >= len) {
            return Err(DatError::corruption(format!(
                "node {} has seed {} out of range",
                index, node.base
            )));
        }
    }
    Ok(())
}

fn verify_free_link(nodes: &[Node], index: usize) -> Result<()> {
    let node = nodes[index];
    let (prev, next) = (node.free_prev(), node.free_next());
    for neighbour in [prev, next] {
        if neighbour == ROOT || neighbour >= nodes.len() || block_of(neighbour) != block_of(index) {
            return Err(DatError::corruption(format!(
                "free node {} links outside its block ({})",
                index, neighbour
            )));
        }
    }
    if !is_free_at(nodes, next) || nodes[next].free_prev() != index {
        return Err(DatError::corruption(format!(
            "free list broken between {} and {}",
            index, next
        )));
    }
    Ok(())
}

/// Check that the block table matches the free nodes of the array
pub(crate) fn verify_blocks(store: &NodeStore) -> Result<()> {
    let nodes = &store.nodes;
    let table = &store.table;
    let blocks = nodes.len() >> BLOCK_SHIFT;
    if table.len() != blocks {
        return Err(DatError::corruption(format!(
            "{} block records for {} blocks",
            table.len(),
            blocks
        )));
    }

    for block_index in 0..blocks {
        let block = table.get(block_index);
        let start = block_index << BLOCK_SHIFT;
        let free = (start..start + BLOCK_SIZE)
            .filter(|&i| is_free_at(nodes, i))
            .count();
        if free != block.empty_number {
            return Err(DatError::corruption(format!(
                "block {} has {} free nodes but records {}",
                block_index, free, block.empty_number
            )));
        }
        if free == 0 {
            continue;
        }

        let head = block.empty_head;
        if block_of(head) != block_index || !is_free_at(nodes, head) {
            return Err(DatError::corruption(format!(
                "block {} free-list head {} is not a free node of the block",
                block_index, head
            )));
        }
        let mut walked = 1;
        let mut cursor = nodes[head].free_next();
        while cursor != head {
            if walked >= free || block_of(cursor) != block_index || !is_free_at(nodes, cursor) {
                walked = 0;
                break;
            }
            walked += 1;
            cursor = nodes[cursor].free_next();
        }
        if walked != free {
            return Err(DatError::corruption(format!(
                "block {} free list does not cycle through its {} free nodes",
                block_index, free
            )));
        }
    }

    let mut listed: Vec<Option<BlockList>> = vec![None; blocks];
    for list in BlockList::ALL {
        for block_index in table.members(list).take(blocks + 1) {
            if block_index == 0 {
                return Err(DatError::corruption("block 0 is on a block list"));
            }
            if let Some(previous) = listed[block_index] {
                return Err(DatError::corruption(format!(
                    "block {} listed as both {:?} and {:?}",
                    block_index, previous, list
                )));
            }
            listed[block_index] = Some(list);

            let block = table.get(block_index);
            if table.get(block.next).prev != block_index {
                return Err(DatError::corruption(format!(
                    "block list {:?} broken after block {}",
                    list, block_index
                )));
            }
            let expected = BlockList::for_empty_number(block.empty_number);
            if expected != list {
                return Err(DatError::corruption(format!(
                    "block {} with {} free nodes is listed as {:?}",
                    block_index, block.empty_number, list
                )));
            }
        }
    }
    if let Some(missing) = (1..blocks).find(|&b| listed[b].is_none()) {
        return Err(DatError::corruption(format!("block {} is on no list", missing)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsa::double_array::node::VALUE_LABEL;

    fn populated() -> NodeStore {
        let mut store = NodeStore::new();
        store.prepare(0);
        for key in [&b"alpha"[..], b"alp", b"beta", b"gamma"] {
            let mut from = ROOT;
            for &byte in key {
                from = store.next(from, byte);
            }
            let to = store.next(from, VALUE_LABEL);
            store.nodes[to].base = key.len() as i32;
        }
        store
    }

    #[test]
    fn test_clean_store_passes() {
        let store = populated();
        assert!(verify_nodes(&store.nodes).is_ok());
        assert!(verify_blocks(&store).is_ok());
    }

    #[test]
    fn test_empty_array_passes() {
        assert!(verify_nodes(&[]).is_ok());
    }

    #[test]
    fn test_detects_misaddressed_child() {
        let mut store = populated();
        // a block-0 node claiming the root, whose children live in block 1
        store.nodes[5] = Node::new(BASE_NONE, 0);
        assert!(verify_nodes(&store.nodes).is_err());
    }

    #[test]
    fn test_detects_bad_root() {
        let mut store = populated();
        store.nodes[ROOT].check = 5;
        assert!(verify_nodes(&store.nodes).is_err());
    }

    #[test]
    fn test_detects_stale_block_count() {
        let mut store = populated();
        store.table.get_mut(1).empty_number += 1;
        assert!(verify_blocks(&store).is_err());
    }

    #[test]
    fn test_detects_wrong_list() {
        let mut store = populated();
        store.table.transfer(1, BlockList::Open, BlockList::Full);
        assert!(verify_blocks(&store).is_err());
    }
}
