//! Owned node storage and its free-list allocator
//!
//! Free nodes of a block form a circular doubly-linked list threaded through
//! their own records (see [`super::node`]). The allocator hands out single
//! nodes in O(1), preferring closed blocks so nearly full blocks get finished
//! before open ones are fragmented, and searches open blocks for a base that
//! fits a whole set of labels when a child set has to be relocated.

use log::{debug, trace};

use super::block::{Block, BlockList, BlockTable};
use super::node::{block_of, is_free_at, Node, BLOCK_SHIFT, BLOCK_SIZE};

/// A node array owned by the trie, plus the block metadata derived from it
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeStore {
    pub(crate) nodes: Vec<Node>,
    pub(crate) table: BlockTable,
    /// Whether `table` describes `nodes`; false right after loading
    pub(crate) indexed: bool,
}

impl NodeStore {
    /// An uninitialized store; the first mutation creates block 0
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            table: BlockTable::new(),
            indexed: true,
        }
    }

    /// Adopt loaded records; block metadata is rebuilt on first mutation
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self {
            indexed: nodes.is_empty(),
            nodes,
            table: BlockTable::new(),
        }
    }

    /// Make the store ready for mutation
    pub fn prepare(&mut self, initial_capacity: usize) {
        if self.nodes.is_empty() {
            self.init(initial_capacity);
        } else if !self.indexed {
            self.restore();
        }
    }

    /// Create block 0 with the pinned root
    fn init(&mut self, initial_capacity: usize) {
        let capacity = round_to_block(initial_capacity.max(BLOCK_SIZE));
        self.nodes = Vec::with_capacity(capacity);
        self.table = BlockTable::with_capacity(capacity >> BLOCK_SHIFT);

        self.nodes.push(Node::root());
        for i in 1..BLOCK_SIZE {
            let prev = if i == 1 { BLOCK_SIZE - 1 } else { i - 1 };
            let next = if i == BLOCK_SIZE - 1 { 1 } else { i + 1 };
            self.nodes.push(Node::free_link(prev, next));
        }
        self.table.append(Block::new(0, 1, BLOCK_SIZE - 1));
        self.indexed = true;
        debug!("initialized double array with capacity for {} nodes", capacity);
    }

    /// Append a block of free nodes and list it as open
    pub fn add_block(&mut self) -> usize {
        let first = self.nodes.len();
        debug_assert_eq!(first % BLOCK_SIZE, 0);
        debug_assert_eq!(block_of(first), self.table.len());

        if self.nodes.len() == self.nodes.capacity() {
            self.nodes.reserve_exact(self.nodes.len().max(BLOCK_SIZE));
            self.table.reserve(self.table.len().max(1));
            debug!(
                "double array capacity doubled to {} nodes",
                self.nodes.capacity()
            );
        }

        let last = first + BLOCK_SIZE - 1;
        self.nodes.extend((first..=last).map(|i| {
            let prev = if i == first { last } else { i - 1 };
            let next = if i == last { first } else { i + 1 };
            Node::free_link(prev, next)
        }));

        let index = self.table.append(Block::fresh(block_of(first), first));
        self.table.push(index, BlockList::Open);
        trace!("added block {} ({} nodes in use)", index, self.nodes.len());
        index
    }

    /// Take free node `index` off its block's free list and store `record` there
    pub fn claim(&mut self, index: usize, record: Node) {
        debug_assert!(is_free_at(&self.nodes, index), "node {} is not free", index);
        let block_index = block_of(index);
        let link = self.nodes[index];

        let block = self.table.get_mut(block_index);
        block.empty_number -= 1;
        let remaining = block.empty_number;

        if remaining == 0 {
            if block_index != 0 {
                self.table.transfer(block_index, BlockList::Closed, BlockList::Full);
            }
        } else {
            let (prev, next) = (link.free_prev(), link.free_next());
            self.nodes[prev].check = -(next as i32);
            self.nodes[next].base = -(prev as i32);

            let block = self.table.get_mut(block_index);
            if block.empty_head == index {
                block.empty_head = next;
            }
            if block_index != 0 && remaining == 1 {
                self.table.transfer(block_index, BlockList::Open, BlockList::Closed);
            }
        }

        self.nodes[index] = record;
    }

    /// Return node `index` to its block's free list
    pub fn release(&mut self, index: usize) {
        let block_index = block_of(index);
        let block = self.table.get_mut(block_index);
        block.empty_number += 1;
        block.reset_search();
        let count = block.empty_number;

        if count == 1 {
            block.empty_head = index;
            self.nodes[index] = Node::free_link(index, index);
            if block_index != 0 {
                self.table.transfer(block_index, BlockList::Full, BlockList::Closed);
            }
        } else {
            let prev = block.empty_head;
            let next = self.nodes[prev].free_next();
            self.nodes[index] = Node::free_link(prev, next);
            self.nodes[prev].check = -(index as i32);
            self.nodes[next].base = -(index as i32);
            if block_index != 0 && count == 2 {
                self.table.transfer(block_index, BlockList::Closed, BlockList::Open);
            }
        }
    }

    /// A free node, growing the array when no listed block has one
    pub fn find_empty_node(&mut self) -> usize {
        let listed = self
            .table
            .head(BlockList::Closed)
            .or_else(|| self.table.head(BlockList::Open));
        let block_index = match listed {
            Some(index) => index,
            None => self.add_block(),
        };
        self.table.get(block_index).empty_head
    }

    /// A base under which `base ^ label` is free for every label
    ///
    /// `labels` must be non-empty and duplicate-free. Open blocks that already
    /// failed a search for as many labels, or failed too often, are skipped
    /// until they gain a free node.
    pub fn find_empty_range(&mut self, labels: &[u8]) -> usize {
        debug_assert!(!labels.is_empty());
        if labels.len() == 1 {
            return self.find_empty_node() ^ labels[0] as usize;
        }

        let wanted = labels.len();
        let head = self.table.head(BlockList::Open);
        let mut cursor = head;
        while let Some(block_index) = cursor {
            let block = *self.table.get(block_index);
            cursor = if Some(block.next) == head { None } else { Some(block.next) };
            if !block.worth_scanning(wanted) {
                continue;
            }
            if let Some(base) = self.fit_in_block(block.empty_head, labels) {
                return base;
            }
            self.table.get_mut(block_index).record_miss(wanted);
            trace!("block {} cannot place {} labels", block_index, wanted);
        }

        self.add_block() << BLOCK_SHIFT
    }

    /// Try every free node of one block as the image of the first label
    fn fit_in_block(&self, empty_head: usize, labels: &[u8]) -> Option<usize> {
        let first = labels[0] as usize;
        let mut candidate = empty_head;
        loop {
            let base = candidate ^ first;
            if labels
                .iter()
                .all(|&label| is_free_at(&self.nodes, base ^ label as usize))
            {
                return Some(base);
            }
            candidate = self.nodes[candidate].free_next();
            if candidate == empty_head {
                return None;
            }
        }
    }

    /// Rebuild every block's free list, count and list membership
    pub fn restore(&mut self) {
        let blocks = self.nodes.len() >> BLOCK_SHIFT;
        self.table.clear();
        self.table.reserve(blocks);

        let mut free = Vec::with_capacity(BLOCK_SIZE);
        for block_index in 0..blocks {
            let start = block_index << BLOCK_SHIFT;
            free.clear();
            free.extend((start..start + BLOCK_SIZE).filter(|&i| is_free_at(&self.nodes, i)));

            let count = free.len();
            for (k, &index) in free.iter().enumerate() {
                let prev = free[(k + count - 1) % count];
                let next = free[(k + 1) % count];
                self.nodes[index] = Node::free_link(prev, next);
            }

            let head = free.first().copied().unwrap_or(start);
            let index = self.table.append(Block::new(block_index, head, count));
            if index != 0 {
                self.table.push(index, BlockList::for_empty_number(count));
            }
        }

        self.indexed = true;
        debug!("restored block metadata for {} blocks", blocks);
    }
}

#[inline]
fn round_to_block(nodes: usize) -> usize {
    (nodes + BLOCK_SIZE - 1) & !(BLOCK_SIZE - 1)
}
