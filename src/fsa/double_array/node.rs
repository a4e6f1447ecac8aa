//! Node records of the double array
//!
//! A node is the legacy fixed-layout pair of `i32` values. Its meaning
//! depends on the node's state:
//!
//! ```text
//! free      check < 0    base = -previous free, check = -next free
//! internal  check >= 0   check = parent, base = XOR seed of the children
//! value     check >= 0   check = parent, base = stored payload (label 0)
//! root      index 0      check = -1, never on a free list
//! ```
//!
//! The array is indexed by plain integers; nothing hands out references into
//! it across a mutating call.

/// Number of nodes in one block
pub const BLOCK_SIZE: usize = 256;

/// Shift turning a node index into its block index
pub const BLOCK_SHIFT: usize = 8;

/// `base` of a node that has no children yet
pub const BASE_NONE: i32 = -1;

/// Index of the root node
pub const ROOT: usize = 0;

/// `check` of the root node
pub const ROOT_CHECK: i32 = -1;

/// Reserved label leading to the value child
pub const VALUE_LABEL: u8 = 0;

/// Size in bytes of one persisted record
pub const NODE_BYTES: usize = std::mem::size_of::<Node>();

/// One `(base, check)` record, byte-compatible with the on-disk format
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    /// Child seed, payload or negated previous free node
    pub base: i32,
    /// Parent index or negated next free node
    pub check: i32,
}

impl Node {
    /// Create a record from raw fields
    #[inline]
    pub const fn new(base: i32, check: i32) -> Self {
        Self { base, check }
    }

    /// The root record of an empty trie
    #[inline]
    pub const fn root() -> Self {
        Self::new(BASE_NONE, ROOT_CHECK)
    }

    /// A freshly claimed node without children
    #[inline]
    pub(crate) const fn leaf(parent: usize) -> Self {
        Self::new(BASE_NONE, parent as i32)
    }

    /// A free-list link record
    #[inline]
    pub(crate) const fn free_link(prev: usize, next: usize) -> Self {
        Self::new(-(prev as i32), -(next as i32))
    }

    /// Whether the record is a free-list link
    ///
    /// The root also has a negative `check`; callers that can see index 0
    /// must use [`is_free_at`] instead.
    #[inline]
    pub const fn is_free_record(&self) -> bool {
        self.check < 0
    }

    /// Previous node of the free list this record belongs to
    #[inline]
    pub(crate) const fn free_prev(&self) -> usize {
        self.base.wrapping_neg() as usize
    }

    /// Next node of the free list this record belongs to
    #[inline]
    pub(crate) const fn free_next(&self) -> usize {
        self.check.wrapping_neg() as usize
    }

    /// Decode a native-endian on-disk record
    #[inline]
    pub fn from_ne_bytes(bytes: [u8; NODE_BYTES]) -> Self {
        let [b0, b1, b2, b3, c0, c1, c2, c3] = bytes;
        Self::new(
            i32::from_ne_bytes([b0, b1, b2, b3]),
            i32::from_ne_bytes([c0, c1, c2, c3]),
        )
    }

    /// Encode into the native on-disk record
    #[inline]
    pub fn to_ne_bytes(self) -> [u8; NODE_BYTES] {
        let mut out = [0u8; NODE_BYTES];
        out[..4].copy_from_slice(&self.base.to_ne_bytes());
        out[4..].copy_from_slice(&self.check.to_ne_bytes());
        out
    }
}

/// Whether `index` is an allocatable free node
#[inline]
pub(crate) fn is_free_at(nodes: &[Node], index: usize) -> bool {
    index != ROOT && nodes[index].check < 0
}

/// Block holding `index`
#[inline]
pub const fn block_of(index: usize) -> usize {
    index >> BLOCK_SHIFT
}

/// Decoded view of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The pinned root
    Root {
        /// Seed of the root's children, if any
        child_seed: Option<usize>,
    },
    /// Member of its block's circular free list
    Free {
        /// Previous free node in the same block
        prev: usize,
        /// Next free node in the same block
        next: usize,
    },
    /// Interior node of some key
    Used {
        /// Parent node
        parent: usize,
        /// Seed of this node's children, if any
        child_seed: Option<usize>,
    },
    /// Terminal node reached through label 0
    Value {
        /// Node whose key this value belongs to
        parent: usize,
        /// Caller payload
        payload: i32,
    },
}

impl NodeState {
    /// Classify `nodes[index]`, or `None` when out of range
    pub fn decode(nodes: &[Node], index: usize) -> Option<Self> {
        let node = *nodes.get(index)?;
        if index == ROOT {
            return Some(Self::Root {
                child_seed: seed(node.base),
            });
        }
        if node.check < 0 {
            return Some(Self::Free {
                prev: node.free_prev(),
                next: node.free_next(),
            });
        }
        let parent = node.check as usize;
        let is_value = nodes
            .get(parent)
            .map_or(false, |p| p.base >= 0 && p.base as usize == index);
        if is_value {
            Some(Self::Value {
                parent,
                payload: node.base,
            })
        } else {
            Some(Self::Used {
                parent,
                child_seed: seed(node.base),
            })
        }
    }

    /// Encode back into the raw record
    pub fn encode(self) -> Node {
        match self {
            Self::Root { child_seed } => Node::new(unseed(child_seed), ROOT_CHECK),
            Self::Free { prev, next } => Node::free_link(prev, next),
            Self::Used { parent, child_seed } => Node::new(unseed(child_seed), parent as i32),
            Self::Value { parent, payload } => Node::new(payload, parent as i32),
        }
    }
}

#[inline]
fn seed(base: i32) -> Option<usize> {
    if base == BASE_NONE {
        None
    } else {
        Some(base as usize)
    }
}

#[inline]
fn unseed(seed: Option<usize>) -> i32 {
    seed.map_or(BASE_NONE, |s| s as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_disk_record() {
        assert_eq!(NODE_BYTES, 8);
        assert_eq!(std::mem::align_of::<Node>(), 4);
    }

    #[test]
    fn test_byte_codec() {
        let node = Node::new(-7, 300);
        assert_eq!(Node::from_ne_bytes(node.to_ne_bytes()), node);
    }

    #[test]
    fn test_decode_states() {
        // root -> 256 (label 'a' under seed 256 ^ 'a'), 256 -> value at 512
        let mut nodes = vec![Node::free_link(1, 1); 768];
        nodes[0] = Node::new(256 ^ b'a' as i32, ROOT_CHECK);
        nodes[256] = Node::new(512, 0);
        nodes[512] = Node::new(42, 256);
        nodes[300] = Node::free_link(299, 301);

        assert_eq!(
            NodeState::decode(&nodes, 0),
            Some(NodeState::Root { child_seed: Some(256 ^ b'a' as usize) })
        );
        assert_eq!(
            NodeState::decode(&nodes, 256),
            Some(NodeState::Used { parent: 0, child_seed: Some(512) })
        );
        assert_eq!(
            NodeState::decode(&nodes, 512),
            Some(NodeState::Value { parent: 256, payload: 42 })
        );
        assert_eq!(
            NodeState::decode(&nodes, 300),
            Some(NodeState::Free { prev: 299, next: 301 })
        );
        assert_eq!(NodeState::decode(&nodes, 768), None);
    }

    #[test]
    fn test_encode_inverts_decode() {
        let a = 256 ^ b'a' as usize;
        let placed = [
            (0, NodeState::Root { child_seed: Some(a) }),
            (a, NodeState::Used { parent: 0, child_seed: Some(512) }),
            (512, NodeState::Value { parent: a, payload: -12 }),
            (400, NodeState::Used { parent: a, child_seed: None }),
            (300, NodeState::Free { prev: 299, next: 301 }),
        ];

        let mut nodes = vec![Node::free_link(1, 1); 768];
        for (index, state) in placed {
            nodes[index] = state.encode();
        }
        for (index, state) in placed {
            assert_eq!(NodeState::decode(&nodes, index), Some(state), "node {}", index);
        }
        assert!(nodes[300].is_free_record());
        assert_eq!(nodes[0].check, ROOT_CHECK);
    }

    #[test]
    fn test_root_is_never_free() {
        let nodes = vec![Node::root(), Node::free_link(1, 1)];
        assert!(!is_free_at(&nodes, 0));
        assert!(is_free_at(&nodes, 1));
    }
}
