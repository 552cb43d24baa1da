pub mod blob_store;
pub mod llm_service;
pub mod validator;

pub use blob_store::{create_blob_store, storage_key, BlobStore, GcsBlobStore, LocalBlobStore};
pub use llm_service::{LlmService, MindMapGenerator};
