pub mod client;
pub mod credentials;
pub mod model;

pub use client::FgaClient;
pub use credentials::{ClientCredentials, Credentials, TokenProvider};
pub use model::{document_viewer_model, sample_tuples, TupleKey};
