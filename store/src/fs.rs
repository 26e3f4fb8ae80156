//! Filesystem-backed stem store.
//!
//! One WAV file per stem, addressed by key, plus a `stems.json` index
//! holding the metadata records. Entries stay externally auditable: an
//! operator can list the directory, play any `<key>.wav` directly, and
//! diff the index. Both the WAV and the index are written through a
//! temp-file-then-rename so a crash never leaves a half-written entry
//! visible.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stemline_audio::wav;
use stemline_synth::VoiceConfig;
use tracing::debug;

use crate::{Result, Stem, StemKey, StemMeta, StemStore, StoreError};

const INDEX_FILE: &str = "stems.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDoc {
    stems: HashMap<StemKey, StemMeta>,
}

/// A durable stem store rooted at a directory.
pub struct FsStemStore {
    root: PathBuf,
    index: Mutex<HashMap<StemKey, StemMeta>>,
}

impl FsStemStore {
    /// Opens (or initializes) a store at the given directory.
    ///
    /// An unreadable index is an error, not a reset — wiping it would
    /// orphan every stored stem.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let file = fs::File::open(&index_path)?;
            let doc: IndexDoc = serde_json::from_reader(file)
                .map_err(|e| StoreError::Index(format!("unreadable {INDEX_FILE}: {e}")))?;
            doc.stems
        } else {
            HashMap::new()
        };

        debug!(root = %root.display(), entries = index.len(), "opened stem store");
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// Returns the directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn wav_path(&self, key: &StemKey) -> PathBuf {
        self.root.join(format!("{key}.wav"))
    }

    fn write_index(&self, index: &HashMap<StemKey, StemMeta>) -> Result<()> {
        let doc = IndexDoc {
            stems: index.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| StoreError::Index(e.to_string()))?;
        let tmp = self.root.join(format!("{INDEX_FILE}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.root.join(INDEX_FILE))?;
        Ok(())
    }

    fn corrupt(key: &StemKey, reason: impl Into<String>) -> StoreError {
        StoreError::CorruptEntry {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl StemStore for FsStemStore {
    async fn get(&self, key: &StemKey) -> Result<Option<Arc<Stem>>> {
        let meta = {
            let index = self
                .index
                .lock()
                .map_err(|e| StoreError::Index(e.to_string()))?;
            match index.get(key) {
                Some(meta) => meta.clone(),
                None => return Ok(None),
            }
        };

        let bytes = match fs::read(self.wav_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Self::corrupt(key, "indexed entry has no audio file"));
            }
            Err(e) => return Err(e.into()),
        };

        let waveform =
            wav::decode(&bytes).map_err(|e| Self::corrupt(key, format!("undecodable wav: {e}")))?;

        let format = waveform.format();
        if waveform.frames() as u64 != meta.frames
            || format.sample_rate != meta.sample_rate
            || format.channels != meta.channels
        {
            return Err(Self::corrupt(
                key,
                format!(
                    "decoded {} frames at {}, index declares {} frames at {} Hz · {} ch",
                    waveform.frames(),
                    format,
                    meta.frames,
                    meta.sample_rate,
                    meta.channels
                ),
            ));
        }

        Ok(Some(Arc::new(Stem::new(key.clone(), waveform))))
    }

    async fn put(&self, stem: &Stem, text: &str, config: &VoiceConfig) -> Result<()> {
        let key = stem.key();
        let bytes = wav::encode(stem.waveform())?;

        // Audio lands fully before the index points at it.
        let path = self.wav_path(key);
        let tmp = self.root.join(format!("{key}.wav.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        let meta = StemMeta::describe(stem, text, config);
        let mut index = self
            .index
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        index.insert(key.clone(), meta);
        self.write_index(&index)?;

        debug!(%key, path = %path.display(), "stem persisted");
        Ok(())
    }

    async fn contains(&self, key: &StemKey) -> Result<bool> {
        let index = self
            .index
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(index.contains_key(key))
    }

    async fn delete(&self, key: &StemKey) -> Result<()> {
        let mut index = self
            .index
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        if index.remove(key).is_some() {
            self.write_index(&index)?;
        }
        match fs::remove_file(self.wav_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StemMeta>> {
        let index = self
            .index
            .lock()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        let mut metas: Vec<StemMeta> = index.values().cloned().collect();
        metas.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(metas)
    }
}
