pub const FGA_API_URL: &str = "https://api.us1.fga.dev";
pub const FGA_API_TOKEN_ISSUER: &str = "auth.fga.dev";
pub const FGA_API_AUDIENCE: &str = "https://api.us1.fga.dev/";
pub const FGA_TIMEOUT_SECS: u64 = 10;
// server-side limit on checks per batch-check call
pub const FGA_MAX_BATCH_SIZE: usize = 50;
pub const FGA_MAX_PARALLEL_REQUESTS: usize = 10;

pub const LLM_BASE_URL: &str = "https://api.openai.com";
pub const LLM_CHAT_MODEL: &str = "gpt-4o-mini";
pub const LLM_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const LLM_TIMEOUT_SECS: u64 = 60;

pub const RETRIEVAL_TOP_K: usize = 4;
pub const RETRIEVAL_SCORE_THRESHOLD: f32 = 0.2;
pub const RETRIEVAL_DOCUMENTS_DIR: &str = "assets/docs";
pub const RETRIEVAL_RELATION: &str = "viewer";
pub const RETRIEVAL_USER_TYPE: &str = "user";
pub const RETRIEVAL_OBJECT_TYPE: &str = "doc";
pub const RETRIEVAL_MAX_CONTEXT_LENGTH: usize = 8000;
pub const RETRIEVAL_AGENT_MAX_STEPS: usize = 6;
