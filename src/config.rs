use crate::run::KeyType;

/// Default block size. Sized to the common filesystem page.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Configuration shared between the writer and the reader of a run.
///
/// The block size is deliberately not stored in the file; writer and
/// reader must agree on it out of band. Opening a run with the wrong
/// block size surfaces as corrupt metadata.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Fixed on-disk size of every block in the run.
    pub block_size: usize,

    /// Key order of the run: raw bytes or 8-byte unsigned integers.
    pub key_type: KeyType,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            key_type: KeyType::Bytes,
        }
    }
}

impl RunConfig {
    /// Create a config with the given block size and byte-ordered keys.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            ..Default::default()
        }
    }

    /// Set the key order.
    pub fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }
}
