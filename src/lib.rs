//! # dyndat: Dynamic, Persistable Double-Array Tries
//!
//! This crate provides an updatable double-array trie mapping byte-string keys
//! to `i32` values, stored as one flat array of 8-byte `(base, check)` records.
//!
//! ## Key Features
//!
//! - **Fast lookups**: one XOR and one comparison per key byte
//! - **Online updates**: keys can be inserted at any time, also into a loaded trie
//! - **Simple persistence**: the saved file is exactly the node array
//! - **Zero-copy views**: query a node array owned elsewhere, or a memory-mapped
//!   file with the `mmap` feature
//! - **Self-audit**: [`DoubleArrayTrie::check`] verifies every structural invariant
//!
//! ## Quick Start
//!
//! ```rust
//! use dyndat::{DoubleArrayTrie, FiniteStateAutomaton, Traversal};
//!
//! let mut trie = DoubleArrayTrie::new();
//! trie.put(b"LARC-DEP", 1).unwrap();
//! trie.put(b"RARC-DEP", 2).unwrap();
//! trie.put(b"SHIFT", 4).unwrap();
//!
//! assert_eq!(trie.get(b"RARC-DEP", -1), 2);
//! assert_eq!(trie.get(b"REDUCE", -1), -1);
//! assert!(trie.accepts(b"SHIFT"));
//!
//! // resumable traversal
//! let mut from = trie.root();
//! assert_eq!(trie.traverse(&mut from, b"LARC-"), Traversal::NoValue);
//! assert_eq!(trie.traverse(&mut from, b"DEP"), Traversal::Value(1));
//!
//! // persistence is the raw node array
//! let mut buffer = Vec::new();
//! trie.write_to(&mut buffer).unwrap();
//! assert_eq!(buffer.len(), trie.size());
//!
//! let view = DoubleArrayTrie::from_slice(trie.array());
//! assert_eq!(view.get(b"SHIFT", -1), 4);
//! assert!(view.check());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod fsa;

// Re-export core types
pub use error::{DatError, Result};
pub use fsa::{
    DoubleArrayTrie, DoubleArrayTrieConfig, FiniteStateAutomaton, Node, NodeState,
    StateInspectable, StatisticsProvider, Traversal, TrieStats, BASE_NONE, BLOCK_SIZE, NODE_BYTES,
};

/// State identifier type for FSA operations; a node index
pub type StateId = u32;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(VERSION.contains('.'));
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2);
    }

    #[test]
    fn test_type_aliases() {
        let _state_id: StateId = 42;
        assert_eq!(std::mem::size_of::<StateId>(), 4);
    }

    #[test]
    fn test_re_exports() {
        let mut trie = DoubleArrayTrie::default();
        trie.put(b"key", 1).unwrap();
        assert_eq!(trie.get(b"key", 0), 1);

        let err = DatError::corruption("test");
        assert_eq!(err.category(), "corruption");
        assert!(std::any::type_name::<Result<()>>().contains("DatError"));
    }
}
