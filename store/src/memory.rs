//! In-memory stem store implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stemline_synth::VoiceConfig;

use crate::{Result, Stem, StemKey, StemMeta, StemStore, StoreError};

/// An in-memory stem store backed by a HashMap.
#[derive(Clone, Default)]
pub struct MemoryStemStore {
    entries: Arc<Mutex<HashMap<StemKey, (Arc<Stem>, StemMeta)>>>,
}

impl MemoryStemStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StemStore for MemoryStemStore {
    async fn get(&self, key: &StemKey) -> Result<Option<Arc<Stem>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(entries.get(key).map(|(stem, _)| stem.clone()))
    }

    async fn put(&self, stem: &Stem, text: &str, config: &VoiceConfig) -> Result<()> {
        let meta = StemMeta::describe(stem, text, config);
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        entries.insert(stem.key().clone(), (Arc::new(stem.clone()), meta));
        Ok(())
    }

    async fn contains(&self, key: &StemKey) -> Result<bool> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(entries.contains_key(key))
    }

    async fn delete(&self, key: &StemKey) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StemMeta>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        let mut metas: Vec<StemMeta> = entries.values().map(|(_, meta)| meta.clone()).collect();
        metas.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(metas)
    }
}
