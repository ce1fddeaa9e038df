//! Documents and the folder loader that feeds the vector store.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A retrievable unit of text. Position in a result list is its rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    /// Similarity score assigned by the retriever, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Reads every regular, non-hidden file in `dir` as one document whose id is
/// the file stem (`private-doc.md` -> `private-doc`). Sorted by file name.
pub fn read_documents(dir: &Path) -> Result<Vec<Document>, RagError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        RagError::Config(format!("cannot read documents dir {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(RagError::internal)?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!("Skipping document with non UTF-8 name: {}", path.display());
            continue;
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            RagError::Config(format!("cannot read document {}: {}", path.display(), e))
        })?;
        documents.push(Document::new(id, content));
    }

    tracing::debug!("Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}
