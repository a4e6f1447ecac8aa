//! Saving and loading node arrays
//!
//! The format is the bare sequence of 8-byte records, `base` then `check`,
//! each a native-endian `i32`. There is no header or checksum, so a file is
//! only accepted if its length is a whole number of blocks and its first
//! record is a valid root.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

use super::allocator::NodeStore;
use super::node::{Node, BLOCK_SIZE, NODE_BYTES, ROOT_CHECK};
use super::verify::verify_nodes;
use super::{DoubleArrayTrie, DoubleArrayTrieConfig, Storage};
use crate::error::{DatError, Result};

/// Number of records in a buffer of `len` bytes
fn record_count(len: usize) -> Result<usize> {
    if len % NODE_BYTES != 0 {
        return Err(DatError::corruption(format!(
            "{} bytes is not a whole number of {}-byte records",
            len, NODE_BYTES
        )));
    }
    let count = len / NODE_BYTES;
    if count % BLOCK_SIZE != 0 {
        return Err(DatError::corruption(format!(
            "{} records is not a whole number of {}-node blocks",
            count, BLOCK_SIZE
        )));
    }
    Ok(count)
}

fn check_root(nodes: &[Node]) -> Result<()> {
    match nodes.first() {
        Some(root) if root.check != ROOT_CHECK => Err(DatError::corruption(format!(
            "first record has check {}, not a root",
            root.check
        ))),
        _ => Ok(()),
    }
}

/// Reinterpret an aligned byte buffer as node records without copying
pub(crate) fn cast_nodes(bytes: &[u8]) -> Result<&[Node]> {
    record_count(bytes.len())?;
    // SAFETY: `Node` is `repr(C)` with two `i32` fields, so any initialized
    // bytes are a valid value; `align_to` only yields properly aligned records.
    let (head, nodes, tail) = unsafe { bytes.align_to::<Node>() };
    if !head.is_empty() || !tail.is_empty() {
        return Err(DatError::corruption(
            "node buffer is not aligned for 4-byte records",
        ));
    }
    Ok(nodes)
}

fn decode_records(bytes: &[u8]) -> Result<Vec<Node>> {
    let count = record_count(bytes.len())?;
    let mut nodes = Vec::with_capacity(count);
    nodes.extend(bytes.chunks_exact(NODE_BYTES).map(|chunk| {
        let mut record = [0u8; NODE_BYTES];
        record.copy_from_slice(chunk);
        Node::from_ne_bytes(record)
    }));
    Ok(nodes)
}

impl DoubleArrayTrie<'static> {
    /// Load a trie saved by [`save`](DoubleArrayTrie::save)
    ///
    /// The loaded trie owns its records and accepts further `put`s.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, DoubleArrayTrieConfig::default())
    }

    /// Load a trie, auditing it first if `config.verify_on_open` is set
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: DoubleArrayTrieConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let expected = file.metadata()?.len() as usize;

        let mut bytes = Vec::with_capacity(expected);
        BufReader::new(file).read_to_end(&mut bytes)?;
        if bytes.len() != expected {
            return Err(DatError::corruption(format!(
                "read {} of {} bytes from {}",
                bytes.len(),
                expected,
                path.display()
            )));
        }

        let trie = Self::from_records(&bytes, config)?;
        debug!("opened {} with {} nodes", path.display(), trie.num_nodes());
        Ok(trie)
    }

    /// Load a trie from a stream of saved records
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Self::read_from_with_config(reader, DoubleArrayTrieConfig::default())
    }

    /// Load a trie from a stream with custom configuration
    pub fn read_from_with_config<R: Read>(mut reader: R, config: DoubleArrayTrieConfig) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_records(&bytes, config)
    }

    fn from_records(bytes: &[u8], config: DoubleArrayTrieConfig) -> Result<Self> {
        let nodes = decode_records(bytes)?;
        check_root(&nodes)?;
        if config.verify_on_open {
            verify_nodes(&nodes)?;
        }
        Ok(Self {
            storage: Storage::Owned(NodeStore::from_nodes(nodes)),
            config,
        })
    }

    /// Map a saved file read-only
    ///
    /// The trie answers queries straight from the page cache; `put` fails
    /// with [`DatError::ReadOnly`]. The file must not change while mapped.
    #[cfg(feature = "mmap")]
    pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::map_file_with_config(path, DoubleArrayTrieConfig::default())
    }

    /// Map a saved file read-only with custom configuration
    #[cfg(feature = "mmap")]
    pub fn map_file_with_config<P: AsRef<Path>>(path: P, config: DoubleArrayTrieConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and callers must not modify the
        // file while it is mapped.
        let map = unsafe { memmap2::Mmap::map(&file)? };

        let nodes = cast_nodes(&map)?;
        check_root(nodes)?;
        if config.verify_on_open {
            verify_nodes(nodes)?;
        }
        debug!("mapped {} with {} nodes", path.display(), nodes.len());
        Ok(Self {
            storage: Storage::Mapped(map),
            config,
        })
    }
}

impl<'a> DoubleArrayTrie<'a> {
    /// Adopt saved records held in memory as a read-only view
    ///
    /// `bytes` must be 4-byte aligned, as it is when it comes from
    /// [`as_bytes`](Self::as_bytes) or a memory map.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        let nodes = cast_nodes(bytes)?;
        check_root(nodes)?;
        Ok(Self::from_slice(nodes))
    }

    /// Write the node records to `path`, replacing the file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!("saved {} nodes to {}", self.num_nodes(), path.display());
        Ok(())
    }

    /// Write the node records to a stream
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> DoubleArrayTrie<'static> {
        let mut trie = DoubleArrayTrie::new();
        for (i, key) in ["apple", "application", "apply", "banana", "band"].iter().enumerate() {
            trie.put(key.as_bytes(), i as i32 * 10).unwrap();
        }
        trie
    }

    #[test]
    fn test_save_and_open() {
        let trie = sample();
        let file = NamedTempFile::new().unwrap();
        trie.save(file.path()).unwrap();

        assert_eq!(std::fs::metadata(file.path()).unwrap().len() as usize, trie.size());

        let loaded = DoubleArrayTrie::open(file.path()).unwrap();
        assert_eq!(loaded.array(), trie.array());
        assert_eq!(loaded.get(b"apply", -1), 20);
        assert_eq!(loaded.get(b"band", -1), 40);
        assert_eq!(loaded.get(b"ban", -1), -1);
    }

    #[test]
    fn test_stream_round_trip() {
        let trie = sample();
        let mut buffer = Vec::new();
        trie.write_to(&mut buffer).unwrap();
        assert_eq!(buffer, trie.as_bytes());

        let loaded = DoubleArrayTrie::read_from(buffer.as_slice()).unwrap();
        assert_eq!(loaded.get(b"application", -1), 10);
    }

    #[test]
    fn test_records_are_native_endian_pairs() {
        let trie = sample();
        let bytes = trie.as_bytes();
        let root = &bytes[..NODE_BYTES];
        assert_eq!(&root[..4], &trie.array()[0].base.to_ne_bytes());
        assert_eq!(&root[4..], &(-1i32).to_ne_bytes());
    }

    #[test]
    fn test_empty_trie_round_trip() {
        let trie = DoubleArrayTrie::new();
        let file = NamedTempFile::new().unwrap();
        trie.save(file.path()).unwrap();
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);

        let mut loaded = DoubleArrayTrie::open(file.path()).unwrap();
        assert_eq!(loaded.size(), 0);
        loaded.put(b"x", 1).unwrap();
        assert_eq!(loaded.get(b"x", 0), 1);
    }

    #[test]
    fn test_rejects_partial_records() {
        let mut bytes = sample().as_bytes().to_vec();
        bytes.pop();
        let err = DoubleArrayTrie::read_from(bytes.as_slice()).unwrap_err();
        assert_eq!(err.category(), "corruption");
    }

    #[test]
    fn test_rejects_partial_blocks() {
        let bytes = sample().as_bytes().to_vec();
        let truncated = &bytes[..bytes.len() - NODE_BYTES];
        assert!(DoubleArrayTrie::read_from(truncated).is_err());
    }

    #[test]
    fn test_rejects_missing_root() {
        let mut bytes = sample().as_bytes().to_vec();
        bytes[4..8].copy_from_slice(&7i32.to_ne_bytes());
        assert!(DoubleArrayTrie::read_from(bytes.as_slice()).is_err());
    }

    #[test]
    fn test_verify_on_open() {
        let trie = sample();
        let mut nodes = trie.array().to_vec();
        // a block-0 node claiming the root is not addressable from it
        nodes[3] = Node::new(-1, 0);
        let broken = DoubleArrayTrie::from_slice(&nodes);
        let mut buffer = Vec::new();
        broken.write_to(&mut buffer).unwrap();

        assert!(DoubleArrayTrie::read_from(buffer.as_slice()).is_ok());
        let config = DoubleArrayTrieConfig {
            verify_on_open: true,
            ..DoubleArrayTrieConfig::default()
        };
        let err = DoubleArrayTrie::read_from_with_config(buffer.as_slice(), config).unwrap_err();
        assert_eq!(err.category(), "corruption");
    }

    #[test]
    fn test_from_bytes_view() {
        let trie = sample();
        let view = DoubleArrayTrie::from_bytes(trie.as_bytes()).unwrap();
        assert!(view.is_read_only());
        assert_eq!(view.get(b"apple", -1), 0);
        assert_eq!(view.array().as_ptr(), trie.array().as_ptr());
    }

    #[test]
    fn test_from_bytes_rejects_misaligned_buffer() {
        let words = vec![0u32; 2 * BLOCK_SIZE + 1];
        // SAFETY: reading initialized `u32`s as bytes
        let bytes = unsafe {
            std::slice::from_raw_parts(words.as_ptr().cast::<u8>(), words.len() * 4)
        };
        let shifted = &bytes[1..1 + BLOCK_SIZE * NODE_BYTES];
        assert!(DoubleArrayTrie::from_bytes(shifted).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DoubleArrayTrie::open(dir.path().join("absent.dat")).unwrap_err();
        assert_eq!(err.category(), "io");
    }

    #[cfg(feature = "mmap")]
    #[test]
    fn test_map_file() {
        let trie = sample();
        let file = NamedTempFile::new().unwrap();
        trie.save(file.path()).unwrap();

        let mut mapped = DoubleArrayTrie::map_file(file.path()).unwrap();
        assert!(mapped.is_read_only());
        assert_eq!(mapped.get(b"banana", -1), 30);
        assert!(mapped.put(b"cherry", 5).is_err());
        assert!(mapped.check());
    }
}
