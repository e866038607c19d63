//! # Embeddings
//!
//! Text embedding generation and vector similarity for pull request
//! retrieval.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert canonical PR text to dense vectors
//! - **Similarity**: Cosine similarity with explicit handling of degenerate vectors
//! - **Bounded Calls**: Deadline wrapper so a stalled provider cannot hang a query
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► cosine_similarity         │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  OpenAI-compatible API                                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider, embed_with_timeout,
};
pub use similarity::{cosine_similarity, dot_product, magnitude};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
