pub mod answer;
pub mod chunking;
pub mod confidence;
pub mod config;
pub mod context;
pub mod document;
pub mod embeddings;
pub mod huggingface;
pub mod rag;
pub mod retrieval;
pub mod server;
