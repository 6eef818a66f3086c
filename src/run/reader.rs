use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::run::block::{self, BlockView};
use crate::run::catalog::{BlockMeta, Catalog};
use crate::run::FOOTER_SIZE;

/// A memory-mapped, read-only view of one run file.
///
/// The reader exclusively owns the mapping and the catalog; both are
/// immutable after open, so a `&Reader` is safe to share across threads
/// for concurrent lookups. Block views borrow from the mapping and
/// cannot outlive the reader. Dropping the reader unmaps the file.
#[derive(Debug)]
pub struct Reader {
    mmap: Mmap,
    config: RunConfig,
    metadata_start: u64,
    catalog: Catalog,
}

impl Reader {
    /// Opens and maps a run file, parsing the footer and walking the
    /// metadata region into the catalog. All corruption checks happen
    /// here, before any lookup is possible.
    pub fn open<P: AsRef<Path>>(path: P, config: RunConfig) -> Result<Self> {
        let file = File::open(path)?;
        let file_sz = file.metadata()?.len();
        if file_sz < FOOTER_SIZE as u64 {
            return Err(Error::FileTooSmall(file_sz));
        }

        // Safety: the file is opened read-only and runs are immutable
        // once sealed; concurrent writers on an open run are excluded by
        // contract.
        let mmap = unsafe { Mmap::map(&file)? };
        #[cfg(unix)]
        let _ = mmap.advise(memmap2::Advice::Random);

        let footer_at = (file_sz - FOOTER_SIZE as u64) as usize;
        let metadata_start = read_u64_le(&mmap[footer_at..footer_at + 8]);
        let block_count = read_u64_le(&mmap[footer_at + 8..footer_at + 16]);

        if metadata_start >= file_sz {
            return Err(Error::CorruptFooter(format!(
                "metadata start {metadata_start} past file end {file_sz}"
            )));
        }
        if metadata_start > footer_at as u64 {
            return Err(Error::CorruptMetadata(format!(
                "metadata start {metadata_start} overlaps the footer"
            )));
        }

        let region = &mmap[metadata_start as usize..footer_at];
        let catalog = Catalog::decode(region, block_count)?;

        tracing::info!(
            blocks = catalog.len(),
            file_size = file_sz,
            "opened run"
        );
        Ok(Self {
            mmap,
            config,
            metadata_start,
            catalog,
        })
    }

    pub fn block_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The full catalog, ordered by block index.
    pub fn catalog(&self) -> &[BlockMeta] {
        self.catalog.entries()
    }

    /// The catalog slice `[lo, hi)`, clamped; empty when `lo >= hi`.
    pub fn catalog_range(&self, lo: usize, hi: usize) -> &[BlockMeta] {
        self.catalog.range(lo, hi)
    }

    /// The catalog entry for the block that may contain `key`, by
    /// first-key binary search.
    pub fn find_block(&self, key: &[u8]) -> Option<&BlockMeta> {
        self.catalog.find(key, self.config.key_type)
    }

    /// A borrowed view over the block described by `meta`.
    pub fn block(&self, meta: &BlockMeta) -> Result<BlockView<'_>> {
        let end = match meta.file_offset.checked_add(self.config.block_size as u64) {
            Some(end) if end <= self.metadata_start => end,
            _ => {
                return Err(Error::OutOfBounds {
                    offset: meta.file_offset,
                    limit: self.metadata_start,
                })
            }
        };
        Ok(block::decode(
            &self.mmap[meta.file_offset as usize..end as usize],
        ))
    }
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
