use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::fga::FgaClient;
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{index_documents, read_documents, EmbeddingCache, InMemoryVectorStore, RagPipeline};

pub mod error;

pub use error::InitializationError;

/// Long-lived collaborators shared by every command.
///
/// Contains:
/// - Configuration and paths
/// - The authorization service client
/// - The LLM provider used for both chat and embeddings
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: AppConfig,
    pub fga: Arc<FgaClient>,
    pub llm: Arc<dyn LlmProvider>,
}

impl AppState {
    /// Loads and validates configuration, then builds the service clients.
    /// Nothing is contacted over the network yet.
    pub fn initialize(paths: Arc<AppPaths>) -> Result<Self, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config.load_config().map_err(InitializationError::Config)?;

        let fga = FgaClient::new(&settings.fga).map_err(InitializationError::Authorization)?;
        let llm = OpenAiProvider::from_settings(&settings.llm).map_err(InitializationError::Llm)?;

        Ok(Self {
            paths,
            config,
            settings,
            fga: Arc::new(fga),
            llm: Arc::new(llm),
        })
    }

    /// Relative documents directories resolve against the project root.
    pub fn documents_dir(&self) -> PathBuf {
        let dir = PathBuf::from(&self.settings.retrieval.documents_dir);
        if dir.is_absolute() {
            dir
        } else {
            self.paths.project_root.join(dir)
        }
    }

    /// Reads and embeds the document folder, then wires the pipeline with the
    /// authorization client as its authorizer.
    pub async fn build_pipeline(&self) -> Result<RagPipeline, InitializationError> {
        let documents_dir = self.documents_dir();
        let documents = read_documents(&documents_dir).map_err(InitializationError::Index)?;
        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            documents_dir.display()
        );

        let store = Arc::new(InMemoryVectorStore::new());
        let mut cache = EmbeddingCache::load(&self.paths.embedding_cache_path());
        index_documents(
            &store,
            self.llm.as_ref(),
            &self.settings.llm.embedding_model,
            &mut cache,
            documents,
        )
        .await
        .map_err(InitializationError::Index)?;

        Ok(RagPipeline::new(
            store,
            self.llm.clone(),
            self.fga.clone(),
            self.settings.llm.clone(),
            self.settings.retrieval.clone(),
        ))
    }
}
