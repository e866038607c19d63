//! Corpus persistence.
//!
//! The corpus file is UTF-8 NDJSON, one [`PrRecord`] per line in fetch
//! order. [`CorpusWriter`] produces it; [`CorpusStore`] loads it once at
//! service start and is read-only afterwards.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::error::{PrContextError, Result};
use crate::model::PrRecord;
use crate::rank::{ScoredRecord, rank};
use crate::scope::RepoScope;

/// An immutable, fully in-memory corpus.
///
/// Sized for one repository's history (hundreds to low thousands of
/// records); every query is a linear scan.
#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    records: Vec<PrRecord>,
    dimension: Option<usize>,
}

impl CorpusStore {
    /// Load a corpus file.
    ///
    /// Blank lines are skipped. A missing file, an unparseable line, a
    /// duplicate record key, or mixed embedding dimensions all fail the load;
    /// nothing is dropped silently.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PrContextError::corpus_load(path, e.to_string()))?;

        let store = Self::parse(&content, path)?;
        info!(
            "Loaded {} PR records from {} (dimension: {})",
            store.len(),
            path.display(),
            store
                .dimension
                .map_or_else(|| "none".to_string(), |d| d.to_string())
        );
        for (scope, count) in store.scope_counts() {
            debug!("  {scope}: {count} records");
        }
        Ok(store)
    }

    /// Parse NDJSON corpus content. `source` is only used in error messages.
    pub fn parse(content: &str, source: &Path) -> Result<Self> {
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: PrRecord = serde_json::from_str(line).map_err(|e| {
                PrContextError::corpus_load(source, format!("line {}: {e}", idx + 1))
            })?;
            records.push(record);
        }
        Self::from_records(records).map_err(|e| match e {
            PrContextError::CorpusLoad { reason, .. } => {
                PrContextError::corpus_load(source, reason)
            }
            other => other,
        })
    }

    /// Build a store from records already in memory.
    pub fn from_records(records: Vec<PrRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut dimension: Option<usize> = None;

        for record in &records {
            if !seen.insert(record.key()) {
                return Err(PrContextError::CorpusLoad {
                    path: "<memory>".to_string(),
                    reason: format!(
                        "duplicate record {}#{}",
                        record.scope(),
                        record.pr_id
                    ),
                });
            }

            if !record.has_embedding() {
                warn!(
                    "PR {}#{} has no embedding and will never rank",
                    record.scope(),
                    record.pr_id
                );
                continue;
            }

            match dimension {
                None => dimension = Some(record.embedding.len()),
                Some(expected) if expected != record.embedding.len() => {
                    return Err(PrContextError::CorpusLoad {
                        path: "<memory>".to_string(),
                        reason: format!(
                            "PR {}#{} has a {}-dimensional embedding, expected {expected}",
                            record.scope(),
                            record.pr_id,
                            record.embedding.len()
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(Self { records, dimension })
    }

    /// Rank this corpus against a query embedding.
    pub fn rank(&self, query: &[f32], scope: &RepoScope, k: usize) -> Result<Vec<ScoredRecord<'_>>> {
        if let Some(expected) = self.dimension
            && expected != query.len()
        {
            return Err(PrContextError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
        rank(&self.records, query, scope, k)
    }

    pub fn records(&self) -> &[PrRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shared embedding dimension, `None` if no record has an embedding.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Number of records per repository.
    pub fn scope_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.scope().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Append-only NDJSON writer with all-or-nothing publication.
///
/// Records go to `<output>.partial` as they arrive. [`CorpusWriter::commit`]
/// renames that file over the output path; [`CorpusWriter::abort`], or
/// dropping the writer uncommitted, deletes it. A failed run therefore never
/// leaves a corpus file behind and never clobbers the previous one.
pub struct CorpusWriter {
    output: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<fs::File>>,
    written: usize,
}

impl CorpusWriter {
    /// Open a writer for `output`.
    pub async fn create(output: impl AsRef<Path>) -> Result<Self> {
        let output = output.as_ref().to_path_buf();
        let mut partial = output.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::File::create(&partial).await?;
        debug!("Writing corpus to {}", partial.display());

        Ok(Self {
            output,
            partial,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// Append one record as a single line.
    pub async fn append(&mut self, record: &PrRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("corpus writer already closed"))?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        self.written += 1;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and publish the corpus at the output path.
    ///
    /// On failure the temporary file is removed and the output path is left
    /// as it was.
    pub async fn commit(mut self) -> Result<usize> {
        if let Err(e) = self.publish().await {
            if let Err(rm) = fs::remove_file(&self.partial).await {
                warn!("Failed to remove {}: {rm}", self.partial.display());
            }
            return Err(e);
        }
        info!(
            "Wrote {} PR records to {}",
            self.written,
            self.output.display()
        );
        Ok(self.written)
    }

    async fn publish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
        }
        fs::rename(&self.partial, &self.output).await?;
        Ok(())
    }

    /// Discard everything written so far.
    pub async fn abort(mut self) {
        self.writer.take();
        if let Err(e) = fs::remove_file(&self.partial).await {
            warn!("Failed to remove {}: {e}", self.partial.display());
        }
    }
}

impl Drop for CorpusWriter {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(pr_id: u64, embedding: Vec<f32>) -> PrRecord {
        PrRecord {
            domain: "github.com".to_string(),
            org: "a".to_string(),
            repo: "b".to_string(),
            pr_id,
            title: format!("PR {pr_id}"),
            body: String::new(),
            author: "octocat".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            merged: false,
            merged_at: None,
            state: "open".to_string(),
            comments: Vec::new(),
            files: Vec::new(),
            embedding,
            text: format!("Title: PR {pr_id}\nBody: "),
        }
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let a = serde_json::to_string(&record(1, vec![1.0, 0.0])).unwrap();
        let b = serde_json::to_string(&record(2, vec![0.0, 1.0])).unwrap();
        let content = format!("\n{a}\n   \n{b}\n\n");

        let store = CorpusStore::parse(&content, Path::new("test.jsonl")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.dimension(), Some(2));
    }

    #[test]
    fn test_parse_fails_on_bad_line() {
        let a = serde_json::to_string(&record(1, vec![1.0])).unwrap();
        let content = format!("{a}\n{{\"pr_id\": 2\n");

        let err = CorpusStore::parse(&content, Path::new("test.jsonl")).unwrap_err();
        match err {
            PrContextError::CorpusLoad { path, reason } => {
                assert_eq!(path, "test.jsonl");
                assert!(reason.starts_with("line 2:"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = CorpusStore::from_records(vec![record(1, vec![1.0]), record(1, vec![0.5])])
            .unwrap_err();
        assert!(matches!(err, PrContextError::CorpusLoad { .. }));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err = CorpusStore::from_records(vec![record(1, vec![1.0]), record(2, vec![0.5, 0.5])])
            .unwrap_err();
        assert!(matches!(err, PrContextError::CorpusLoad { .. }));
    }

    #[test]
    fn test_empty_embeddings_do_not_set_dimension() {
        let store =
            CorpusStore::from_records(vec![record(1, Vec::new()), record(2, vec![1.0, 2.0, 3.0])])
                .unwrap();
        assert_eq!(store.dimension(), Some(3));
    }

    #[test]
    fn test_rank_rejects_query_of_wrong_dimension() {
        let store = CorpusStore::from_records(vec![record(1, vec![1.0, 0.0])]).unwrap();
        let scope = RepoScope::new("github.com", "a", "b");
        let err = store.rank(&[1.0, 0.0, 0.0], &scope, 3).unwrap_err();
        assert!(matches!(
            err,
            PrContextError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CorpusStore::load(dir.path().join("absent.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrContextError::CorpusLoad { .. }));
    }

    #[tokio::test]
    async fn test_writer_commit_publishes_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested").join("prs.jsonl");

        let mut writer = CorpusWriter::create(&output).await.unwrap();
        writer.append(&record(1, vec![1.0, 0.0])).await.unwrap();
        writer.append(&record(2, vec![0.0, 1.0])).await.unwrap();
        assert!(!output.exists());
        assert_eq!(writer.commit().await.unwrap(), 2);

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(!dir.path().join("nested").join("prs.jsonl.partial").exists());
    }

    #[tokio::test]
    async fn test_writer_abort_leaves_previous_corpus() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("prs.jsonl");
        std::fs::write(&output, "previous\n").unwrap();

        let mut writer = CorpusWriter::create(&output).await.unwrap();
        writer.append(&record(1, vec![1.0])).await.unwrap();
        writer.abort().await;

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous\n");
        assert!(!dir.path().join("prs.jsonl.partial").exists());
    }

    #[tokio::test]
    async fn test_writer_drop_cleans_up() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("prs.jsonl");
        {
            let mut writer = CorpusWriter::create(&output).await.unwrap();
            writer.append(&record(1, vec![1.0])).await.unwrap();
        }
        assert!(!output.exists());
        assert!(!dir.path().join("prs.jsonl.partial").exists());
    }

    #[tokio::test]
    async fn test_failed_commit_removes_partial() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("prs.jsonl");

        let mut writer = CorpusWriter::create(&output).await.unwrap();
        writer.append(&record(1, vec![1.0])).await.unwrap();
        // A non-empty directory at the output path makes the rename fail.
        std::fs::create_dir(&output).unwrap();
        std::fs::write(output.join("keep"), "x").unwrap();

        assert!(writer.commit().await.is_err());
        assert!(output.join("keep").exists());
        assert!(!dir.path().join("prs.jsonl.partial").exists());
    }
}
