//! Block-metadata catalog: the in-memory image of the metadata region.

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::run::{key_to_u64, KeyType};

/// Metadata for one block: its position in the run, its starting file
/// offset and the first key it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
    pub index: usize,
    pub file_offset: u64,
    pub first_key: Vec<u8>,
}

impl BlockMeta {
    /// The first key as a little-endian integer, zero-extended from up
    /// to its first 8 bytes.
    pub fn first_key_as_u64(&self) -> u64 {
        key_to_u64(&self.first_key)
    }
}

/// Ordered, immutable-after-open catalog of every block in a run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<BlockMeta>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, file_offset: u64, first_key: Vec<u8>) {
        let index = self.entries.len();
        self.entries.push(BlockMeta {
            index,
            file_offset,
            first_key,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BlockMeta] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&BlockMeta> {
        self.entries.get(index)
    }

    /// The half-open slice `[lo, hi)`, clamped to the catalog bounds.
    /// Empty when `lo >= hi`.
    pub fn range(&self, lo: usize, hi: usize) -> &[BlockMeta] {
        let lo = lo.min(self.entries.len());
        let hi = hi.min(self.entries.len());
        if lo >= hi {
            return &[];
        }
        &self.entries[lo..hi]
    }

    /// Finds the block that may contain `key`: the last entry whose
    /// first key is not greater than `key`. None when `key` sorts before
    /// every block.
    pub fn find(&self, key: &[u8], key_type: KeyType) -> Option<&BlockMeta> {
        let idx = self
            .entries
            .partition_point(|meta| key_type.compare(&meta.first_key, key) != Ordering::Greater);
        if idx == 0 {
            return None;
        }
        self.entries.get(idx - 1)
    }

    /// Serializes the metadata region.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for meta in &self.entries {
            buf.write_u64::<LittleEndian>(meta.file_offset)?;
            buf.write_u16::<LittleEndian>(meta.first_key.len() as u16)?;
            buf.write_all(&meta.first_key)?;
        }
        Ok(buf)
    }

    /// Walks a metadata region, decoding exactly `block_count` entries.
    /// The walk must consume the buffer exactly; anything else is
    /// corruption.
    pub fn decode(buffer: &[u8], block_count: u64) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(buffer);
        let mut entries = Vec::new();

        for index in 0..block_count {
            let file_offset = cursor
                .read_u64::<LittleEndian>()
                .map_err(|_| Error::CorruptMetadata(format!("entry {index} truncated")))?;
            let key_len = cursor
                .read_u16::<LittleEndian>()
                .map_err(|_| Error::CorruptMetadata(format!("entry {index} truncated")))?
                as usize;
            if cursor.position() as usize + key_len > buffer.len() {
                return Err(Error::CorruptMetadata(format!(
                    "entry {index} first key of {key_len} bytes runs past the region"
                )));
            }
            let mut first_key = vec![0u8; key_len];
            cursor
                .read_exact(&mut first_key)
                .map_err(|_| Error::CorruptMetadata(format!("entry {index} truncated")))?;
            entries.push(BlockMeta {
                index: index as usize,
                file_offset,
                first_key,
            });
        }

        let walked = cursor.position() as usize;
        if walked != buffer.len() {
            return Err(Error::CorruptMetadata(format!(
                "{} bytes left after {block_count} entries",
                buffer.len() - walked
            )));
        }
        Ok(Self { entries })
    }
}
