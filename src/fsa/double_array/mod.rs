//! Dynamic Double Array Trie
//!
//! This module provides an updatable double-array trie that maps byte-string
//! keys to `i32` values and persists as a flat array of 8-byte records:
//! - **O(key length) lookups**: one XOR and one comparison per byte
//! - **Online insertion**: keys can be added at any time, also after loading
//! - **Zero-copy views**: a node array owned by someone else can be adopted
//!   read-only without copying
//!
//! # Algorithm Overview
//!
//! Every node has a `base` and a `check`. For a transition from node `s`
//! with label `c`:
//! ```text
//! t = base[s] ^ c
//! if check[t] == s then the transition exists
//! ```
//! A key's value hangs off the node reached by its last byte, under the
//! reserved label `0`, so keys must not contain NUL bytes.
//!
//! Free nodes are kept in per-block circular lists (a block is 256 nodes).
//! When a new edge needs a slot that some other parent already owns, the
//! smaller of the two child sets is moved to a fresh range.
//!
//! # Persistence
//!
//! [`DoubleArrayTrie::save`] writes exactly the node records, native-endian,
//! without a header. Block metadata is not stored; a loaded trie rebuilds it
//! the first time it is modified.

mod allocator;
mod block;
pub mod node;
mod persist;
mod resolve;
mod transition;
mod verify;

use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use node::{Node, NodeState, BASE_NONE, BLOCK_SIZE, NODE_BYTES};

use crate::error::{DatError, Result};
use crate::fsa::traits::{FiniteStateAutomaton, StateInspectable, StatisticsProvider, TrieStats};
use crate::StateId;
use allocator::NodeStore;
use block::BlockList;
use node::{is_free_at, BLOCK_SHIFT, ROOT, VALUE_LABEL};
use transition::step;

/// Configuration for a Double Array Trie
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DoubleArrayTrieConfig {
    /// Nodes reserved when the first key is inserted, rounded up to whole blocks
    pub initial_capacity: usize,
    /// Audit every array loaded from a file or stream and reject broken ones
    pub verify_on_open: bool,
}

impl Default for DoubleArrayTrieConfig {
    fn default() -> Self {
        Self {
            initial_capacity: BLOCK_SIZE,
            verify_on_open: false,
        }
    }
}

/// Outcome of [`DoubleArrayTrie::traverse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Some byte of the key has no edge
    Missing,
    /// The whole key is a path, but no value is stored at its end
    NoValue,
    /// The key is stored with this value
    Value(i32),
}

impl Traversal {
    /// The stored value, or `default` when there is none
    #[inline]
    pub fn value_or(self, default: i32) -> i32 {
        match self {
            Traversal::Value(value) => value,
            Traversal::Missing | Traversal::NoValue => default,
        }
    }

    /// The stored value, if any
    #[inline]
    pub fn value(self) -> Option<i32> {
        match self {
            Traversal::Value(value) => Some(value),
            Traversal::Missing | Traversal::NoValue => None,
        }
    }

    /// Whether the whole key was consumed
    #[inline]
    pub fn path_exists(self) -> bool {
        !matches!(self, Traversal::Missing)
    }
}

/// Where the node records live
enum Storage<'a> {
    /// Growable array owned by the trie
    Owned(NodeStore),
    /// Caller-owned records adopted without copying
    Borrowed(&'a [Node]),
    /// Read-only mapping of a saved file
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
}

/// Updatable double-array trie from byte strings to `i32` values
///
/// Owned tries grow on [`put`](Self::put). Views created by
/// [`from_slice`](Self::from_slice), [`from_bytes`](Self::from_bytes) or
/// [`set_array`](Self::set_array) only answer queries; `put` on them fails
/// with [`DatError::ReadOnly`].
///
/// # Examples
///
/// ```rust
/// use dyndat::DoubleArrayTrie;
///
/// let mut trie = DoubleArrayTrie::new();
/// trie.put(b"LARC-DEP", 1).unwrap();
/// trie.put(b"RARC-OBJ", 13).unwrap();
///
/// assert_eq!(trie.get(b"LARC-DEP", -1), 1);
/// assert_eq!(trie.get(b"SHIFT", -1), -1);
/// ```
pub struct DoubleArrayTrie<'a> {
    storage: Storage<'a>,
    config: DoubleArrayTrieConfig,
}

impl<'a> DoubleArrayTrie<'a> {
    /// Create an empty trie; no storage is allocated until the first `put`
    pub fn new() -> Self {
        Self::with_config(DoubleArrayTrieConfig::default())
    }

    /// Create an empty trie with custom configuration
    pub fn with_config(config: DoubleArrayTrieConfig) -> Self {
        Self {
            storage: Storage::Owned(NodeStore::new()),
            config,
        }
    }

    /// Adopt a node array as a read-only view, without copying it
    pub fn from_slice(nodes: &'a [Node]) -> Self {
        Self {
            storage: Storage::Borrowed(nodes),
            config: DoubleArrayTrieConfig::default(),
        }
    }

    /// Replace the contents with a read-only view of `nodes`
    ///
    /// Whatever the trie held before is dropped.
    pub fn set_array(&mut self, nodes: &'a [Node]) {
        self.storage = Storage::Borrowed(nodes);
    }

    /// Get the configuration
    pub fn config(&self) -> &DoubleArrayTrieConfig {
        &self.config
    }

    /// The node records
    pub fn array(&self) -> &[Node] {
        match &self.storage {
            Storage::Owned(store) => store.nodes.as_slice(),
            Storage::Borrowed(nodes) => *nodes,
            #[cfg(feature = "mmap")]
            Storage::Mapped(map) => persist::cast_nodes(map).unwrap_or(&[]),
        }
    }

    /// The node records as the bytes written by [`save`](Self::save)
    pub fn as_bytes(&self) -> &[u8] {
        let nodes = self.array();
        // SAFETY: `Node` is `repr(C)` with two `i32` fields and no padding,
        // so the records are exactly `len * NODE_BYTES` initialized bytes.
        unsafe { std::slice::from_raw_parts(nodes.as_ptr().cast::<u8>(), nodes.len() * NODE_BYTES) }
    }

    /// Size of the node array in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.num_nodes() * NODE_BYTES
    }

    /// Number of node records, a multiple of [`BLOCK_SIZE`]
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.array().len()
    }

    /// Whether `put` is refused
    pub fn is_read_only(&self) -> bool {
        !matches!(self.storage, Storage::Owned(_))
    }

    /// Decoded view of node `index`
    pub fn node_state(&self, index: usize) -> Option<NodeState> {
        NodeState::decode(self.array(), index)
    }

    /// Look up `key`, returning `default` when it is not stored
    #[inline]
    pub fn get(&self, key: &[u8], default: i32) -> i32 {
        let mut from = ROOT as StateId;
        self.traverse(&mut from, key).value_or(default)
    }

    /// Whether `key` is stored
    #[inline]
    pub fn contains(&self, key: &[u8]) -> bool {
        let mut from = ROOT as StateId;
        self.traverse(&mut from, key).value().is_some()
    }

    /// Walk `key` starting at node `from`
    ///
    /// `from` is advanced over every byte that has an edge, so a later call
    /// with the same `from` continues the walk where this one stopped.
    ///
    /// ```rust
    /// use dyndat::{DoubleArrayTrie, Traversal};
    ///
    /// let mut trie = DoubleArrayTrie::new();
    /// trie.put(b"foobar", 2).unwrap();
    ///
    /// let mut from = 0;
    /// assert_eq!(trie.traverse(&mut from, b"foo"), Traversal::NoValue);
    /// assert_eq!(trie.traverse(&mut from, b"bar"), Traversal::Value(2));
    /// ```
    pub fn traverse(&self, from: &mut StateId, key: &[u8]) -> Traversal {
        if key.contains(&VALUE_LABEL) {
            return Traversal::Missing;
        }
        let nodes = self.array();
        let mut current = *from as usize;
        for &byte in key {
            match step(nodes, current, byte) {
                Some(to) => {
                    current = to;
                    *from = to as StateId;
                }
                None => return Traversal::Missing,
            }
        }
        match step(nodes, current, VALUE_LABEL) {
            Some(to) => Traversal::Value(nodes[to].base),
            // only the root and interior nodes are positions on a key path
            None => match NodeState::decode(nodes, current) {
                Some(NodeState::Root { .. } | NodeState::Used { .. }) => Traversal::NoValue,
                _ => Traversal::Missing,
            },
        }
    }

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// [`DatError::InvalidKey`] if `key` contains a NUL byte,
    /// [`DatError::ReadOnly`] if the trie is a view of borrowed or mapped
    /// records. Neither modifies the trie.
    pub fn put(&mut self, key: &[u8], value: i32) -> Result<()> {
        if key.contains(&VALUE_LABEL) {
            return Err(DatError::invalid_key(format!(
                "{}-byte key contains a NUL byte",
                key.len()
            )));
        }
        let initial_capacity = self.config.initial_capacity;
        let store = match &mut self.storage {
            Storage::Owned(store) => store,
            _ => {
                warn!("refusing to insert into a read-only double array");
                return Err(DatError::read_only("insert into a borrowed node array"));
            }
        };

        store.prepare(initial_capacity);
        let mut from = ROOT;
        for &byte in key {
            from = store.next(from, byte);
        }
        let to = store.next(from, VALUE_LABEL);
        store.nodes[to].base = value;
        Ok(())
    }

    /// Copy the records into a new owned, mutable trie
    pub fn to_owned_trie(&self) -> DoubleArrayTrie<'static> {
        DoubleArrayTrie {
            storage: Storage::Owned(NodeStore::from_nodes(self.array().to_vec())),
            config: self.config.clone(),
        }
    }
}

impl Default for DoubleArrayTrie<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DoubleArrayTrie<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = match &self.storage {
            Storage::Owned(_) => "owned",
            Storage::Borrowed(_) => "borrowed",
            #[cfg(feature = "mmap")]
            Storage::Mapped(_) => "mapped",
        };
        f.debug_struct("DoubleArrayTrie")
            .field("storage", &storage)
            .field("nodes", &self.num_nodes())
            .field("config", &self.config)
            .finish()
    }
}

impl FiniteStateAutomaton for DoubleArrayTrie<'_> {
    fn root(&self) -> StateId {
        ROOT as StateId
    }

    fn is_final(&self, state: StateId) -> bool {
        step(self.array(), state as usize, VALUE_LABEL).is_some()
    }

    fn transition(&self, state: StateId, symbol: u8) -> Option<StateId> {
        // label 0 leads to values, not to key bytes
        if symbol == VALUE_LABEL {
            return None;
        }
        step(self.array(), state as usize, symbol).map(|to| to as StateId)
    }

    fn transitions(&self, state: StateId) -> Box<dyn Iterator<Item = (u8, StateId)> + '_> {
        let nodes = self.array();
        Box::new((1..=u8::MAX).filter_map(move |symbol| {
            step(nodes, state as usize, symbol).map(|to| (symbol, to as StateId))
        }))
    }
}

impl StateInspectable for DoubleArrayTrie<'_> {}

impl StatisticsProvider for DoubleArrayTrie<'_> {
    fn stats(&self) -> TrieStats {
        let nodes = self.array();
        let mut stats = TrieStats {
            num_nodes: nodes.len(),
            num_blocks: nodes.len() >> BLOCK_SHIFT,
            memory_usage: nodes.len() * NODE_BYTES,
            ..TrieStats::default()
        };

        for block_index in 0..stats.num_blocks {
            let start = block_index << BLOCK_SHIFT;
            let free = (start..start + BLOCK_SIZE)
                .filter(|&i| is_free_at(nodes, i))
                .count();
            stats.free_nodes += free;
            if block_index != 0 {
                match BlockList::for_empty_number(free) {
                    BlockList::Open => stats.open_blocks += 1,
                    BlockList::Closed => stats.closed_blocks += 1,
                    BlockList::Full => stats.full_blocks += 1,
                }
            }
        }

        stats.num_keys = (1..nodes.len())
            .filter(|&i| matches!(NodeState::decode(nodes, i), Some(NodeState::Value { .. })))
            .count();
        stats.calculate_bits_per_key();
        stats
    }
}
