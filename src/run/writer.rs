use std::fs::File;
use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::run::block::{self, Builder};
use crate::run::catalog::Catalog;
use crate::run::FOOTER_SIZE;

/// Streams already-ordered records into a run file.
///
/// Records must arrive in the run's key order; the writer packs them
/// greedily, first-fit-in-order, and never reorders. Use [`write_run`]
/// for unsorted input.
pub struct Writer {
    file: File,
    config: RunConfig,
    builder: Builder,
    catalog: Catalog,
    offset: u64,
    records: u64,
}

impl Writer {
    pub fn create<P: AsRef<Path>>(path: P, config: RunConfig) -> Result<Self> {
        let file = File::create(path)?;
        let builder = Builder::new(config.block_size);
        Ok(Self {
            file,
            config,
            builder,
            catalog: Catalog::new(),
            offset: 0,
            records: 0,
        })
    }

    /// Appends one record, flushing the current block first when the
    /// record does not fit it.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.builder.add(key, value) {
            self.records += 1;
            return Ok(());
        }
        if !self.builder.is_empty() {
            self.flush_block()?;
            if self.builder.add(key, value) {
                self.records += 1;
                return Ok(());
            }
        }
        Err(Error::BlockOverflow {
            needed: block::encoded_len(1, key.len(), value.len()),
            capacity: self.config.block_size,
        })
    }

    fn flush_block(&mut self) -> Result<()> {
        let builder = std::mem::replace(&mut self.builder, Builder::new(self.config.block_size));
        let first_key = builder.first_key().to_vec();
        let data = builder.finish();
        self.catalog.push(self.offset, first_key);
        self.file.write_all(&data)?;
        self.offset += data.len() as u64;
        Ok(())
    }

    /// Flushes the last block, writes the metadata region and the
    /// footer, and seals the file.
    pub fn finish(mut self) -> Result<()> {
        if !self.builder.is_empty() {
            self.flush_block()?;
        }

        let metadata_start = self.offset;
        let metadata = self.catalog.encode()?;
        self.file.write_all(&metadata)?;
        self.file.write_u64::<LittleEndian>(metadata_start)?;
        self.file.write_u64::<LittleEndian>(self.catalog.len() as u64)?;
        self.file.flush()?;

        tracing::info!(
            blocks = self.catalog.len(),
            records = self.records,
            bytes = metadata_start + metadata.len() as u64 + FOOTER_SIZE as u64,
            "sealed run"
        );
        Ok(())
    }
}

/// Sorts the records by the run's key order and writes them as one run.
///
/// Fails with `SizeMismatch` when the arrays differ in length and with
/// `BlockOverflow` when a single record cannot fit a block; a partial
/// file may remain on failure and should be discarded by the caller.
pub fn write_run<P: AsRef<Path>>(
    path: P,
    config: RunConfig,
    keys: Vec<Vec<u8>>,
    values: Vec<Vec<u8>>,
) -> Result<()> {
    if keys.len() != values.len() {
        return Err(Error::SizeMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }

    let key_type = config.key_type;
    let mut records: Vec<(Vec<u8>, Vec<u8>)> = keys.into_iter().zip(values).collect();
    records.sort_by(|a, b| key_type.compare(&a.0, &b.0));

    let mut writer = Writer::create(path, config)?;
    for (key, value) in &records {
        writer.add(key, value)?;
    }
    writer.finish()
}
