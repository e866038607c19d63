//! # PR Corpus
//!
//! Data model, durable NDJSON format, and similarity ranking for a corpus of
//! historical pull requests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        PR Corpus                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  build_text ──► embedding ──► PrRecord ──► CorpusWriter (NDJSON)│
//! │                                                │                │
//! │                                                ▼                │
//! │  RepoScope + query embedding ──► rank ◄── CorpusStore           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same [`build_text`] runs at ingestion and at query time so both sides
//! of a comparison live in the same embedding space.

pub mod error;
pub mod model;
pub mod rank;
pub mod scope;
pub mod store;
pub mod text;

pub use error::{ErrorKind, PrContextError, Result};
pub use model::{PrComment, PrFileDiff, PrRecord, RecordKey};
pub use rank::{DEFAULT_TOP_K, ScoredRecord, rank};
pub use scope::RepoScope;
pub use store::{CorpusStore, CorpusWriter};
pub use text::build_text;
