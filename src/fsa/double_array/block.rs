//! Per-block bookkeeping for the free-list allocator
//!
//! Every run of 256 consecutive nodes has a [`Block`] record. Blocks other
//! than block 0 sit on exactly one of three circular doubly-linked lists,
//! chosen by how many free nodes they still hold:
//!
//! - open: more than one free node
//! - closed: exactly one free node
//! - full: no free node
//!
//! Block 0 carries the root and is never listed. None of this is persisted;
//! it is rebuilt from the node array on demand.

use super::node::BLOCK_SIZE;

/// Failed range searches after which a block is skipped until it gains a free node
pub(crate) const MAX_TRIAL: u32 = 2;

/// `reject` of a block that has never failed a range search
pub(crate) const NO_REJECT: usize = BLOCK_SIZE + 1;

/// The three block lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockList {
    /// Blocks with more than one free node
    Open,
    /// Blocks with exactly one free node
    Closed,
    /// Blocks with no free node
    Full,
}

impl BlockList {
    /// All lists, in slot order
    pub const ALL: [BlockList; 3] = [BlockList::Open, BlockList::Closed, BlockList::Full];

    /// The list a block with `empty_number` free nodes belongs to
    #[inline]
    pub fn for_empty_number(empty_number: usize) -> Self {
        match empty_number {
            0 => BlockList::Full,
            1 => BlockList::Closed,
            _ => BlockList::Open,
        }
    }

    #[inline]
    fn slot(self) -> usize {
        match self {
            BlockList::Open => 0,
            BlockList::Closed => 1,
            BlockList::Full => 2,
        }
    }
}

/// Metadata of one 256-node block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    /// Previous block on the same list
    pub prev: usize,
    /// Next block on the same list
    pub next: usize,
    /// A free node of this block, meaningless when `empty_number == 0`
    pub empty_head: usize,
    /// Number of free nodes in this block
    pub empty_number: usize,
    /// Smallest label-set size a range search failed to place here
    pub reject: usize,
    /// Range searches that failed here since the last release
    pub trial: u32,
}

impl Block {
    /// An unlinked block with `empty_number` free nodes starting at `empty_head`
    pub fn new(index: usize, empty_head: usize, empty_number: usize) -> Self {
        Self {
            prev: index,
            next: index,
            empty_head,
            empty_number,
            reject: NO_REJECT,
            trial: 0,
        }
    }

    /// A block whose nodes are all free, with its free list starting at `first`
    pub fn fresh(index: usize, first: usize) -> Self {
        Self::new(index, first, BLOCK_SIZE)
    }

    /// Whether a range search for `wanted` labels should scan this block
    #[inline]
    pub fn worth_scanning(&self, wanted: usize) -> bool {
        self.empty_number >= wanted && wanted < self.reject && self.trial < MAX_TRIAL
    }

    /// Record a failed range search for `wanted` labels
    #[inline]
    pub fn record_miss(&mut self, wanted: usize) {
        self.reject = self.reject.min(wanted);
        self.trial += 1;
    }

    /// Forget failed searches; the block just gained a free node
    #[inline]
    pub fn reset_search(&mut self) {
        self.reject = NO_REJECT;
        self.trial = 0;
    }
}

/// Block records plus the heads of the three block lists
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockTable {
    blocks: Vec<Block>,
    heads: [Option<usize>; 3],
}

impl BlockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(blocks: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(blocks),
            heads: [None; 3],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.heads = [None; 3];
    }

    /// Append a block record; it is not linked into any list yet
    pub fn append(&mut self, block: Block) -> usize {
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    /// Reserve room for as many block records as `additional` more blocks
    pub fn reserve(&mut self, additional: usize) {
        self.blocks.reserve(additional);
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Block {
        &self.blocks[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut Block {
        &mut self.blocks[index]
    }

    #[inline]
    pub fn head(&self, list: BlockList) -> Option<usize> {
        self.heads[list.slot()]
    }

    /// Link `index` at the head of `list`
    pub fn push(&mut self, index: usize, list: BlockList) {
        match self.heads[list.slot()] {
            None => {
                let block = &mut self.blocks[index];
                block.prev = index;
                block.next = index;
            }
            Some(head) => {
                let tail = self.blocks[head].prev;
                self.blocks[index].prev = tail;
                self.blocks[index].next = head;
                self.blocks[tail].next = index;
                self.blocks[head].prev = index;
            }
        }
        self.heads[list.slot()] = Some(index);
    }

    /// Unlink `index` from `list`
    pub fn pop(&mut self, index: usize, list: BlockList) {
        let Block { prev, next, .. } = self.blocks[index];
        let head = &mut self.heads[list.slot()];
        if next == index {
            debug_assert_eq!(*head, Some(index), "sole block is not the list head");
            *head = None;
            return;
        }
        self.blocks[prev].next = next;
        self.blocks[next].prev = prev;
        if *head == Some(index) {
            *head = Some(next);
        }
    }

    /// Move `index` from one list to another
    #[inline]
    pub fn transfer(&mut self, index: usize, from: BlockList, to: BlockList) {
        self.pop(index, from);
        self.push(index, to);
    }

    /// Blocks of `list` in link order, starting at the head
    pub fn members(&self, list: BlockList) -> ListIter<'_> {
        ListIter {
            table: self,
            start: self.head(list),
            cursor: self.head(list),
        }
    }
}

/// Walks one circular block list exactly once
pub(crate) struct ListIter<'a> {
    table: &'a BlockTable,
    start: Option<usize>,
    cursor: Option<usize>,
}

impl Iterator for ListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.cursor?;
        let next = self.table.blocks[current].next;
        self.cursor = if Some(next) == self.start { None } else { Some(next) };
        Some(current)
    }
}
