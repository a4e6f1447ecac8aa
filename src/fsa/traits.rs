//! Core FSA (Finite State Automaton) traits and abstractions
//!
//! A trie is walked as an automaton over bytes: states are node indices, and
//! a state is final when a key ends there.

use crate::StateId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Core trait for finite state automaton operations
pub trait FiniteStateAutomaton {
    /// Get the initial/root state
    fn root(&self) -> StateId;

    /// Check if a state is final (accepting)
    fn is_final(&self, state: StateId) -> bool;

    /// Transition from a state given an input symbol
    fn transition(&self, state: StateId, symbol: u8) -> Option<StateId>;

    /// Get all possible transitions from a state, in symbol order
    fn transitions(&self, state: StateId) -> Box<dyn Iterator<Item = (u8, StateId)> + '_>;

    /// Check if the automaton accepts a given input sequence
    fn accepts(&self, input: &[u8]) -> bool {
        let mut state = self.root();
        for &symbol in input {
            match self.transition(state, symbol) {
                Some(next_state) => state = next_state,
                None => return false,
            }
        }
        self.is_final(state)
    }

    /// Find the longest prefix of input that leads to a final state
    fn longest_prefix(&self, input: &[u8]) -> Option<usize> {
        let mut state = self.root();
        let mut last_final = None;

        for (i, &symbol) in input.iter().enumerate() {
            if self.is_final(state) {
                last_final = Some(i);
            }

            match self.transition(state, symbol) {
                Some(next_state) => state = next_state,
                None => return last_final,
            }
        }

        if self.is_final(state) {
            Some(input.len())
        } else {
            last_final
        }
    }
}

/// Trait for automata that support state inspection
pub trait StateInspectable: FiniteStateAutomaton {
    /// Get the outgoing degree (number of transitions) from a state
    fn out_degree(&self, state: StateId) -> usize {
        self.transitions(state).count()
    }

    /// Get all outgoing symbols from a state
    fn out_symbols(&self, state: StateId) -> Vec<u8> {
        self.transitions(state).map(|(symbol, _)| symbol).collect()
    }

    /// Check if a state has any outgoing transitions
    fn is_leaf(&self, state: StateId) -> bool {
        self.out_degree(state) == 0
    }
}

/// Occupancy statistics of a double array
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrieStats {
    /// Number of node records, free ones included
    pub num_nodes: usize,
    /// Nodes currently on a free list
    pub free_nodes: usize,
    /// Number of keys stored
    pub num_keys: usize,
    /// Number of 256-node blocks
    pub num_blocks: usize,
    /// Blocks with more than one free node
    pub open_blocks: usize,
    /// Blocks with exactly one free node
    pub closed_blocks: usize,
    /// Blocks without free nodes
    pub full_blocks: usize,
    /// Memory usage in bytes
    pub memory_usage: usize,
    /// Space efficiency (bits per key)
    pub bits_per_key: f64,
}

impl TrieStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes holding a root, an edge or a value
    pub fn used_nodes(&self) -> usize {
        self.num_nodes - self.free_nodes
    }

    /// Fraction of nodes in use, 0 for an empty array
    pub fn fill_ratio(&self) -> f64 {
        if self.num_nodes == 0 {
            0.0
        } else {
            self.used_nodes() as f64 / self.num_nodes as f64
        }
    }

    /// Calculate bits per key
    pub fn calculate_bits_per_key(&mut self) {
        if self.num_keys > 0 {
            self.bits_per_key = (self.memory_usage * 8) as f64 / self.num_keys as f64;
        }
    }
}

/// Trait for automata that provide performance statistics
pub trait StatisticsProvider {
    /// Get detailed statistics about the trie
    fn stats(&self) -> TrieStats;

    /// Get memory usage in bytes
    fn memory_usage(&self) -> usize {
        self.stats().memory_usage
    }

    /// Get space efficiency in bits per key
    fn bits_per_key(&self) -> f64 {
        self.stats().bits_per_key
    }
}
