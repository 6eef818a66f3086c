//! Silt: read-optimized, block-structured sorted runs served by a
//! learned-index front-end.
//!
//! A run is written once — records sorted, packed into fixed-size
//! self-describing blocks, cataloged by a first-key metadata footer —
//! and then read many times through a zero-copy memory-mapped
//! [`Reader`]. Point lookups go through the [`Engine`], which asks an
//! external two-level predictor where a key should live and probes a
//! bounded error window inside the predicted block(s), falling back to
//! catalog binary search when the predictor is wrong or unavailable.

pub mod config;
pub mod engine;
pub mod error;
pub mod run;

pub use config::RunConfig;
pub use engine::{Engine, GlobalModel, LeafModel, Prediction, Predictor};
pub use error::{Error, Result};
pub use run::block::BlockView;
pub use run::catalog::BlockMeta;
pub use run::reader::Reader;
pub use run::writer::{write_run, Writer};
pub use run::KeyType;
