//! On-disk cache of document embeddings, keyed by model and content hash, so
//! re-running against an unchanged corpus does not re-embed it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::core::errors::RagError;

pub struct EmbeddingCache {
    path: PathBuf,
    entries: HashMap<String, Vec<f32>>,
    dirty: bool,
}

impl EmbeddingCache {
    /// Opens the cache file. A missing or unreadable file yields an empty
    /// cache; it is rebuilt on the next [`save`](Self::save).
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!("Discarding corrupt embedding cache {}: {}", path.display(), err);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        }
    }

    pub fn key(model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update(b"\n");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, model: &str, text: &str) -> Option<&Vec<f32>> {
        self.entries.get(&Self::key(model, text))
    }

    pub fn insert(&mut self, model: &str, text: &str, embedding: Vec<f32>) {
        self.entries.insert(Self::key(model, text), embedding);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the cache if it changed since it was loaded.
    pub fn save(&mut self) -> Result<(), RagError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(RagError::internal)?;
        }
        let bytes = serde_json::to_vec(&self.entries).map_err(RagError::internal)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes).map_err(RagError::internal)?;
        fs::rename(&tmp_path, &self.path).map_err(RagError::internal)?;

        self.dirty = false;
        Ok(())
    }
}
