//! # PR Context Server
//!
//! MCP query service that answers "which past pull requests in this
//! repository look like this one?" from a corpus built by
//! `pr-context-ingest`.
//!
//! ```text
//!  streamable HTTP (/mcp) ──┐
//!                           ├──► SearchService ──► EmbeddingProvider
//!  stdio ───────────────────┘          │
//!                                      ▼
//!                              CorpusStore::rank
//! ```
//!
//! The corpus is loaded once before either binding accepts a request and is
//! shared read-only between concurrent queries.

pub mod config;
pub mod http;
pub mod search;
pub mod tools;

pub use config::{EmbeddingConfig, ServiceConfig};
pub use search::{CommentView, SearchQuery, SearchService, SimilarPr};
pub use tools::{HttpSearchTools, StdioSearchTools};
