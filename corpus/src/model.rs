//! Corpus record types.
//!
//! One [`PrRecord`] is one line of the NDJSON corpus file. Field names are
//! the on-disk format and must not be renamed.

use chrono::{DateTime, Utc};
use pr_context_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::scope::RepoScope;

/// A comment attached to a pull request.
///
/// `line` and `filename` are present only for review comments anchored to
/// the diff; general conversation comments carry neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrComment {
    pub domain: String,
    pub org: String,
    pub repo: String,
    pub pr_id: u64,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// One changed file of a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrFileDiff {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    #[serde(default)]
    pub patch: Option<String>,
}

/// A historical pull request with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrRecord {
    pub domain: String,
    pub org: String,
    pub repo: String,
    pub pr_id: u64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub merged: bool,
    pub merged_at: Option<DateTime<Utc>>,
    pub state: String,
    #[serde(default)]
    pub comments: Vec<PrComment>,
    #[serde(default)]
    pub files: Vec<PrFileDiff>,
    /// Empty when generation failed; such records never rank.
    #[serde(default)]
    pub embedding: Embedding,
    /// Canonical text the embedding was generated from.
    pub text: String,
}

/// Identity of a record inside a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub scope: RepoScope,
    pub pr_id: u64,
}

impl PrRecord {
    /// The repository this record belongs to.
    pub fn scope(&self) -> RepoScope {
        RepoScope::new(&self.domain, &self.org, &self.repo)
    }

    /// Whether `self` lives in `scope`, compared field by field without
    /// allocating.
    pub fn in_scope(&self, scope: &RepoScope) -> bool {
        self.domain == scope.domain && self.org == scope.org && self.repo == scope.repo
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            scope: self.scope(),
            pr_id: self.pr_id,
        }
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// Web URL of the pull request.
    pub fn url(&self) -> String {
        self.scope().pull_url(self.pr_id)
    }
}
