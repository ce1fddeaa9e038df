pub mod core;
pub mod fga;
pub mod llm;
pub mod rag;
pub mod state;
