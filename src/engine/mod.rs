//! Point-lookup engine combining a learned-index predictor with the
//! mapped reader and the in-block search.
//!
//! The predictor is an external collaborator: a global model routes a
//! key to a leaf model, the leaf predicts a position in the run's
//! record space with an error bound. The engine clamps predictions,
//! probes the error window (enlarged across block boundaries when the
//! bound spans them), and falls back to a catalog-wide binary search
//! when the predictor cannot place the key. Misses are `None`; lookups
//! never surface errors.

use crate::error::Result;
use crate::run::reader::Reader;
use crate::run::search;

/// A predicted position in the run's global record space, with the
/// model's error bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub position: u64,
    pub error_bound: u64,
}

/// First level of the learned index: routes a key to a leaf model.
/// `None` means the key is outside the model's domain.
pub trait GlobalModel: Send + Sync {
    fn predict(&self, key: &[u8]) -> Option<usize>;
}

/// Second level of the learned index: predicts where in the run the key
/// lives. `None` means the leaf cannot place the key.
pub trait LeafModel: Send + Sync {
    fn predict(&self, key: &[u8]) -> Option<Prediction>;
}

/// A two-level learned index: one global router plus its leaves.
pub struct Predictor {
    global: Box<dyn GlobalModel>,
    leaves: Vec<Box<dyn LeafModel>>,
}

impl Predictor {
    pub fn new(global: Box<dyn GlobalModel>, leaves: Vec<Box<dyn LeafModel>>) -> Self {
        Self { global, leaves }
    }

    fn predict(&self, key: &[u8]) -> Option<Prediction> {
        let leaf = self.global.predict(key)?;
        self.leaves.get(leaf)?.predict(key)
    }
}

/// Above this many candidate records the engine abandons the linear
/// window probe for offset-table binary search.
const WINDOW_SEARCH_LIMIT: u64 = 64;

/// The lookup engine. Holds a shared reference to the reader and owns
/// the predictor; everything else is per-call scratch.
pub struct Engine<'r> {
    reader: &'r Reader,
    predictor: Predictor,
    /// block_starts[i] is the number of records before block i;
    /// the final entry is the run's record total.
    block_starts: Vec<u64>,
}

impl<'r> Engine<'r> {
    /// Builds the engine, reading each block header once to map global
    /// record positions onto blocks.
    pub fn new(reader: &'r Reader, predictor: Predictor) -> Result<Self> {
        let mut block_starts = Vec::with_capacity(reader.block_count() + 1);
        let mut total = 0u64;
        block_starts.push(0);
        for meta in reader.catalog() {
            total += reader.block(meta)?.len() as u64;
            block_starts.push(total);
        }
        Ok(Self {
            reader,
            predictor,
            block_starts,
        })
    }

    pub fn total_records(&self) -> u64 {
        self.block_starts.last().copied().unwrap_or(0)
    }

    /// Resolves a single key to its value, or `None` when the run does
    /// not contain it. Never fails: predictor trouble and unreadable
    /// blocks degrade to the catalog-driven path and to misses.
    pub fn lookup(&self, key: &[u8]) -> Option<&'r [u8]> {
        if let Some(prediction) = self.predictor.predict(key) {
            if let Some(value) = self.window_lookup(key, prediction) {
                return Some(value);
            }
        } else {
            tracing::debug!("prediction unavailable, using catalog fallback");
        }
        self.fallback_lookup(key)
    }

    /// Independent, order-preserving [`lookup`](Self::lookup) per key.
    pub fn batch_lookup<K: AsRef<[u8]>>(&self, keys: &[K]) -> Vec<Option<&'r [u8]>> {
        keys.iter().map(|key| self.lookup(key.as_ref())).collect()
    }

    fn window_lookup(&self, key: &[u8], prediction: Prediction) -> Option<&'r [u8]> {
        let total = self.total_records();
        if total == 0 {
            return None;
        }
        // Clamp out-of-range predictions into the record space.
        let position = prediction.position.min(total - 1);
        let lo = position.saturating_sub(prediction.error_bound);
        let hi = position
            .saturating_add(prediction.error_bound)
            .saturating_add(1)
            .min(total);

        let block_lo = self.block_of(lo);
        let block_hi = self.block_of(hi - 1) + 1;
        let key_type = self.reader.config().key_type;
        let wide = hi - lo > WINDOW_SEARCH_LIMIT;

        for meta in self.reader.catalog_range(block_lo, block_hi) {
            let view = match self.reader.block(meta) {
                Ok(view) => view,
                Err(err) => {
                    tracing::warn!(block = meta.index, %err, "skipping unreadable block");
                    continue;
                }
            };
            let found = if wide {
                search::binary_search(&view, key_type, key)
            } else {
                let start = self.block_starts[meta.index];
                let local_lo = lo.saturating_sub(start) as usize;
                let local_hi = (hi - start).min(view.len() as u64) as usize;
                search::linear_search(&view, key_type, key, local_lo, local_hi)
            };
            if let Some((_, value)) = found {
                return Some(value);
            }
        }
        None
    }

    /// Catalog-wide routing by first key, then in-block binary search.
    fn fallback_lookup(&self, key: &[u8]) -> Option<&'r [u8]> {
        let meta = self.reader.find_block(key)?;
        let view = match self.reader.block(meta) {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(block = meta.index, %err, "skipping unreadable block");
                return None;
            }
        };
        let key_type = self.reader.config().key_type;
        search::binary_search(&view, key_type, key).map(|(_, value)| value)
    }

    /// The block containing global record position `pos` (callers keep
    /// `pos` below the record total).
    fn block_of(&self, pos: u64) -> usize {
        self.block_starts.partition_point(|&start| start <= pos) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::run::writer::write_run;
    use crate::run::KeyType;
    use std::cmp::Ordering;
    use tempfile::TempDir;

    /// Routes everything to leaf 0.
    struct SingleLeaf;
    impl GlobalModel for SingleLeaf {
        fn predict(&self, _key: &[u8]) -> Option<usize> {
            Some(0)
        }
    }

    /// Refuses every key, as if it were out of the trained domain.
    struct OutOfDomain;
    impl GlobalModel for OutOfDomain {
        fn predict(&self, _key: &[u8]) -> Option<usize> {
            None
        }
    }

    /// Predicts the key's true sorted position with a fixed bound.
    struct ExactLeaf {
        keys: Vec<Vec<u8>>,
        key_type: KeyType,
        bound: u64,
    }
    impl LeafModel for ExactLeaf {
        fn predict(&self, key: &[u8]) -> Option<Prediction> {
            let position = self
                .keys
                .partition_point(|k| self.key_type.compare(k, key) == Ordering::Less)
                as u64;
            Some(Prediction {
                position,
                error_bound: self.bound,
            })
        }
    }

    /// Always claims the key is at a fixed position with a fixed bound.
    struct ConstantLeaf {
        position: u64,
        error_bound: u64,
    }
    impl LeafModel for ConstantLeaf {
        fn predict(&self, _key: &[u8]) -> Option<Prediction> {
            Some(Prediction {
                position: self.position,
                error_bound: self.error_bound,
            })
        }
    }

    fn exact_predictor(keys: &[Vec<u8>], key_type: KeyType, bound: u64) -> Predictor {
        let mut sorted = keys.to_vec();
        sorted.sort_by(|a, b| key_type.compare(a, b));
        Predictor::new(
            Box::new(SingleLeaf),
            vec![Box::new(ExactLeaf {
                keys: sorted,
                key_type,
                bound,
            })],
        )
    }

    fn constant_predictor(position: u64, error_bound: u64) -> Predictor {
        Predictor::new(
            Box::new(SingleLeaf),
            vec![Box::new(ConstantLeaf {
                position,
                error_bound,
            })],
        )
    }

    fn no_predictor() -> Predictor {
        Predictor::new(Box::new(OutOfDomain), Vec::new())
    }

    fn integer_run(
        dir: &TempDir,
        block_size: usize,
        entries: &[(u64, &str)],
    ) -> std::path::PathBuf {
        let path = dir.path().join("test.run");
        let keys: Vec<Vec<u8>> = entries.iter().map(|(k, _)| k.to_le_bytes().to_vec()).collect();
        let values: Vec<Vec<u8>> = entries.iter().map(|(_, v)| v.as_bytes().to_vec()).collect();
        write_run(
            path.clone(),
            RunConfig::new(block_size).key_type(KeyType::Integer),
            keys,
            values,
        )
        .unwrap();
        path
    }

    #[test]
    fn integers_single_block() {
        let dir = TempDir::new().unwrap();
        let path = integer_run(&dir, 256, &[(1, "a"), (2, "bb"), (3, "ccc")]);
        let reader =
            Reader::open(path, RunConfig::new(256).key_type(KeyType::Integer)).unwrap();
        assert_eq!(reader.block_count(), 1);

        let keys: Vec<Vec<u8>> = [1u64, 2, 3].iter().map(|k| k.to_le_bytes().to_vec()).collect();
        let engine = Engine::new(&reader, exact_predictor(&keys, KeyType::Integer, 1)).unwrap();

        assert_eq!(engine.lookup(&2u64.to_le_bytes()), Some(b"bb".as_slice()));
        assert_eq!(engine.lookup(&4u64.to_le_bytes()), None);
    }

    #[test]
    fn integers_forced_split() {
        let dir = TempDir::new().unwrap();
        let entries: Vec<(u64, String)> = (1..=20).map(|k| (k, format!("v{k}"))).collect();
        let borrowed: Vec<(u64, &str)> = entries.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let path = integer_run(&dir, 64, &borrowed);
        let reader = Reader::open(path, RunConfig::new(64).key_type(KeyType::Integer)).unwrap();
        assert!(reader.block_count() >= 2);
        assert!(reader.catalog()[1].first_key_as_u64() > reader.catalog()[0].first_key_as_u64());

        let keys: Vec<Vec<u8>> = (1u64..=20).map(|k| k.to_le_bytes().to_vec()).collect();
        let engine = Engine::new(&reader, exact_predictor(&keys, KeyType::Integer, 2)).unwrap();
        assert_eq!(engine.lookup(&11u64.to_le_bytes()), Some(b"v11".as_slice()));
    }

    #[test]
    fn bytes_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.run");
        write_run(
            path.clone(),
            RunConfig::new(128),
            vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()],
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()],
        )
        .unwrap();
        let reader = Reader::open(path, RunConfig::new(128)).unwrap();
        let keys = vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()];
        let engine = Engine::new(&reader, exact_predictor(&keys, KeyType::Bytes, 1)).unwrap();

        assert_eq!(engine.lookup(b"beta"), Some(b"2".as_slice()));
        assert_eq!(engine.lookup(b"aardvark"), None);
    }

    #[test]
    fn lying_predictor_still_resolves() {
        // A predictor stuck on position 0 with a zero bound: keys in
        // later blocks must come back through the catalog fallback.
        let dir = TempDir::new().unwrap();
        let entries: Vec<(u64, String)> = (1..=60).map(|k| (k, format!("v{k}"))).collect();
        let borrowed: Vec<(u64, &str)> = entries.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let path = integer_run(&dir, 64, &borrowed);
        let reader = Reader::open(path, RunConfig::new(64).key_type(KeyType::Integer)).unwrap();
        assert!(reader.block_count() >= 10);

        let engine = Engine::new(&reader, constant_predictor(0, 0)).unwrap();
        for k in 1u64..=60 {
            let expected = format!("v{k}");
            assert_eq!(
                engine.lookup(&k.to_le_bytes()),
                Some(expected.as_bytes()),
                "key {k}"
            );
        }
        assert_eq!(engine.lookup(&61u64.to_le_bytes()), None);
        assert_eq!(engine.lookup(&0u64.to_le_bytes()), None);
    }

    #[test]
    fn conservative_bound_spans_blocks() {
        // An arbitrary in-range position with a bound covering the whole
        // run still resolves every key through the enlarged window. The
        // window is far past the linear limit, so this drives the
        // per-block binary probe.
        let dir = TempDir::new().unwrap();
        let entries: Vec<(u64, String)> = (1..=200).map(|k| (k, format!("v{k}"))).collect();
        let borrowed: Vec<(u64, &str)> = entries.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let path = integer_run(&dir, 64, &borrowed);
        let reader = Reader::open(path, RunConfig::new(64).key_type(KeyType::Integer)).unwrap();

        let engine = Engine::new(&reader, constant_predictor(17, 100_000)).unwrap();
        for k in 1u64..=200 {
            let expected = format!("v{k}");
            assert_eq!(engine.lookup(&k.to_le_bytes()), Some(expected.as_bytes()));
        }
    }

    #[test]
    fn predictor_error_falls_back_to_catalog() {
        let dir = TempDir::new().unwrap();
        let entries: Vec<(u64, String)> = (1..=20).map(|k| (k, format!("v{k}"))).collect();
        let borrowed: Vec<(u64, &str)> = entries.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let path = integer_run(&dir, 64, &borrowed);
        let reader = Reader::open(path, RunConfig::new(64).key_type(KeyType::Integer)).unwrap();

        let engine = Engine::new(&reader, no_predictor()).unwrap();
        assert_eq!(engine.lookup(&7u64.to_le_bytes()), Some(b"v7".as_slice()));
        assert_eq!(engine.lookup(&21u64.to_le_bytes()), None);
    }

    #[test]
    fn batch_lookup_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = integer_run(&dir, 256, &[(1, "a"), (2, "bb"), (3, "ccc")]);
        let reader =
            Reader::open(path, RunConfig::new(256).key_type(KeyType::Integer)).unwrap();
        let engine = Engine::new(&reader, no_predictor()).unwrap();

        let queries: Vec<Vec<u8>> = [3u64, 9, 1]
            .iter()
            .map(|k| k.to_le_bytes().to_vec())
            .collect();
        let results = engine.batch_lookup(&queries);
        assert_eq!(
            results,
            vec![Some(b"ccc".as_slice()), None, Some(b"a".as_slice())]
        );
    }

    #[test]
    fn empty_run_always_misses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.run");
        write_run(path.clone(), RunConfig::new(64), Vec::new(), Vec::new()).unwrap();
        let reader = Reader::open(path, RunConfig::new(64)).unwrap();
        let engine = Engine::new(&reader, constant_predictor(5, 100)).unwrap();
        assert_eq!(engine.total_records(), 0);
        assert_eq!(engine.lookup(b"anything"), None);
    }

    #[test]
    fn randomized_roundtrip() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        let mut keys = std::collections::BTreeSet::new();
        while keys.len() < 500 {
            keys.insert(rng.gen_range(0u64..1_000_000) * 2); // even keys only
        }
        let keys: Vec<u64> = keys.into_iter().collect();
        let entries: Vec<(u64, String)> = keys.iter().map(|&k| (k, format!("val-{k}"))).collect();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.run");
        write_run(
            path.clone(),
            RunConfig::new(512).key_type(KeyType::Integer),
            entries.iter().map(|(k, _)| k.to_le_bytes().to_vec()).collect(),
            entries.iter().map(|(_, v)| v.as_bytes().to_vec()).collect(),
        )
        .unwrap();

        let reader = Reader::open(path, RunConfig::new(512).key_type(KeyType::Integer)).unwrap();
        let key_bytes: Vec<Vec<u8>> = keys.iter().map(|k| k.to_le_bytes().to_vec()).collect();
        let engine = Engine::new(&reader, exact_predictor(&key_bytes, KeyType::Integer, 2)).unwrap();

        for (k, v) in &entries {
            assert_eq!(engine.lookup(&k.to_le_bytes()), Some(v.as_bytes()));
        }
        // Odd keys were never written.
        for _ in 0..200 {
            let absent = rng.gen_range(0u64..2_000_000) | 1;
            assert_eq!(engine.lookup(&absent.to_le_bytes()), None);
        }
    }
}
