//! Content-addressed stem cache.
//!
//! Maps [`StemKey`]s (derived from text + voice configuration) to durable
//! audio stems so identical synthesis requests are served once and reused
//! indefinitely. Provides a trait-based store interface with a filesystem
//! implementation for persistence and an in-memory implementation for
//! testing, plus [`StemCache`]: the single-flight layer that guarantees at
//! most one in-flight synthesis per key under concurrent access.
//!
//! The cache is intentionally append-only: entries are never implicitly
//! evicted, and [`StemStore::delete`] is the only removal path.

pub mod cache;
pub mod fs;
pub mod key;
pub mod memory;
pub mod stem;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stemline_synth::{SynthesisError, VoiceConfig};

pub use cache::{Provenance, StemCache};
pub use fs::FsStemStore;
pub use key::{normalize_text, StemKey};
pub use memory::MemoryStemStore;
pub use stem::{Stem, StemMeta};

/// Errors that can occur in stem store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored entry does not match its declared metadata. Corruption is
    /// reported, never silently repaired; recovery requires an explicit
    /// delete and regeneration.
    #[error("corrupt cache entry for {key}: {reason}")]
    CorruptEntry { key: StemKey, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav codec error: {0}")]
    Codec(#[from] stemline_audio::WavError),

    #[error("stem index error: {0}")]
    Index(String),

    #[error("failed to persist stem: {0}")]
    Persist(String),

    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent mapping from stem keys to audio assets.
///
/// Implementations are the system's only shared mutable resource; all of
/// them must be safe for concurrent use. Mutual exclusion per key during
/// synthesis is not the store's job — that lives in [`StemCache`].
#[async_trait]
pub trait StemStore: Send + Sync {
    /// Looks up a stem. Returns `Ok(None)` on a clean miss and
    /// `Err(StoreError::CorruptEntry)` when an entry exists but its audio
    /// cannot be trusted.
    async fn get(&self, key: &StemKey) -> Result<Option<Arc<Stem>>>;

    /// Stores a stem with the synthesis inputs that produced it.
    async fn put(&self, stem: &Stem, text: &str, config: &VoiceConfig) -> Result<()>;

    /// Returns true if an entry exists for the key (without loading audio).
    async fn contains(&self, key: &StemKey) -> Result<bool>;

    /// Removes an entry. A no-op if the key is absent.
    async fn delete(&self, key: &StemKey) -> Result<()>;

    /// Enumerates entry metadata for audits, ordered by key. Does not load
    /// audio.
    async fn list(&self) -> Result<Vec<StemMeta>>;
}

/// A shared handle to a stem store.
pub type SharedStemStore = Arc<dyn StemStore>;
