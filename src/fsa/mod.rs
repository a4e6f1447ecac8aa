//! Finite State Automata and Trie structures
//!
//! This module provides the dynamic double-array trie and the FSA interfaces
//! it implements.

pub mod double_array;
pub mod traits;

// Re-export core types
pub use double_array::{
    DoubleArrayTrie, DoubleArrayTrieConfig, Node, NodeState, Traversal, BASE_NONE, BLOCK_SIZE,
    NODE_BYTES,
};
pub use traits::{FiniteStateAutomaton, StateInspectable, StatisticsProvider, TrieStats};
