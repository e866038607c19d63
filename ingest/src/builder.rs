//! Sequential corpus builder.
//!
//! Pull requests are fetched page by page, embedded one at a time, and
//! appended to the corpus file in fetch order. Any failure aborts the run and
//! discards the partial output; a corpus never contains vectorless records
//! written by this builder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pr_context_corpus::{
    CorpusWriter, PrComment, PrFileDiff, PrRecord, RepoScope, Result, build_text,
};
use pr_context_embeddings::{
    EmbeddingError, EmbeddingProvider, EmbeddingRequest, embed_with_timeout,
};
use tracing::{debug, info, warn};

use crate::github::{MAX_PER_PAGE, PullRequestSource, PullRequestSummary};

/// Default cap on the number of pull requests ingested.
pub const DEFAULT_MAX_PRS: usize = 300;

/// Default corpus file name.
pub const DEFAULT_OUTPUT: &str = "prs.jsonl";

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub output: PathBuf,
    pub records: usize,
    pub dimension: Option<usize>,
    pub elapsed_ms: u64,
}

/// Builds a corpus file from a [`PullRequestSource`] and an
/// [`EmbeddingProvider`].
pub struct CorpusBuilder<'a> {
    source: &'a dyn PullRequestSource,
    provider: &'a dyn EmbeddingProvider,
    embed_timeout: Duration,
    max_prs: usize,
}

impl<'a> CorpusBuilder<'a> {
    pub fn new(source: &'a dyn PullRequestSource, provider: &'a dyn EmbeddingProvider) -> Self {
        Self {
            source,
            provider,
            embed_timeout: Duration::from_secs(30),
            max_prs: DEFAULT_MAX_PRS,
        }
    }

    /// Stop after this many pull requests.
    pub fn with_max_prs(mut self, max_prs: usize) -> Self {
        self.max_prs = max_prs;
        self
    }

    /// Deadline for each embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Ingest `scope` into `output`.
    ///
    /// The file at `output` is only replaced once every record has been
    /// written; on error it is left as it was.
    pub async fn build(&self, scope: &RepoScope, output: &Path) -> Result<IngestReport> {
        let started = Instant::now();
        info!("Ingesting up to {} PRs from {scope}", self.max_prs);

        let mut writer = CorpusWriter::create(output).await?;
        let dimension = match self.collect(scope, &mut writer).await {
            Ok(dimension) => dimension,
            Err(e) => {
                warn!(
                    "Ingestion of {scope} failed after {} records: {e}",
                    writer.written()
                );
                writer.abort().await;
                return Err(e);
            }
        };
        let records = writer.commit().await?;

        let report = IngestReport {
            output: output.to_path_buf(),
            records,
            dimension,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Ingested {} PRs from {scope} in {}ms",
            report.records, report.elapsed_ms
        );
        Ok(report)
    }

    async fn collect(&self, scope: &RepoScope, writer: &mut CorpusWriter) -> Result<Option<usize>> {
        let per_page = (self.max_prs.min(MAX_PER_PAGE as usize) as u32).max(1);
        let mut dimension: Option<usize> = None;
        let mut seen: HashSet<u64> = HashSet::new();
        let mut page = 1;

        while writer.written() < self.max_prs {
            let prs = self
                .source
                .list_pull_requests(scope, page, per_page)
                .await?;
            if prs.is_empty() {
                debug!("Page {page} is empty, listing exhausted");
                break;
            }

            for pr in prs {
                if writer.written() >= self.max_prs {
                    break;
                }
                // The listing shifts when PRs are opened mid-run, so a page
                // can repeat the tail of the previous one.
                if !seen.insert(pr.number) {
                    debug!("Skipping PR #{} already ingested", pr.number);
                    continue;
                }
                let record = self.build_record(scope, pr).await?;

                match dimension {
                    None => dimension = Some(record.embedding.len()),
                    Some(expected) if expected != record.embedding.len() => {
                        return Err(EmbeddingError::DimensionMismatch {
                            expected,
                            actual: record.embedding.len(),
                        }
                        .into());
                    }
                    Some(_) => {}
                }

                writer.append(&record).await?;
                info!(
                    "[{}/{}] #{} {}",
                    writer.written(),
                    self.max_prs,
                    record.pr_id,
                    record.title
                );
            }
            page += 1;
        }

        Ok(dimension)
    }

    async fn build_record(&self, scope: &RepoScope, pr: PullRequestSummary) -> Result<PrRecord> {
        let number = pr.number;
        let (files, review_comments, issue_comments) = tokio::try_join!(
            self.source.list_files(scope, number),
            self.source.list_review_comments(scope, number),
            self.source.list_issue_comments(scope, number),
        )?;

        let body = pr.body.unwrap_or_default();
        let filenames: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        let text = build_text(&pr.title, &body, &filenames);

        let response = embed_with_timeout(
            self.provider,
            EmbeddingRequest::new(text.clone()),
            self.embed_timeout,
        )
        .await?;
        if response.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "empty embedding for PR #{number}"
            ))
            .into());
        }

        let comment = |body: String, author: Option<String>, created_at, line, filename| {
            PrComment {
                domain: scope.domain.clone(),
                org: scope.org.clone(),
                repo: scope.repo.clone(),
                pr_id: number,
                body,
                author,
                created_at,
                line,
                filename,
            }
        };

        let mut comments = Vec::with_capacity(review_comments.len() + issue_comments.len());
        comments.extend(review_comments.into_iter().map(|c| {
            comment(
                c.body,
                c.user.map(|u| u.login),
                c.created_at,
                c.line.or(c.original_line),
                Some(c.path),
            )
        }));
        comments.extend(issue_comments.into_iter().map(|c| {
            comment(
                c.body.unwrap_or_default(),
                c.user.map(|u| u.login),
                c.created_at,
                None,
                None,
            )
        }));

        Ok(PrRecord {
            domain: scope.domain.clone(),
            org: scope.org.clone(),
            repo: scope.repo.clone(),
            pr_id: number,
            title: pr.title,
            body,
            author: pr.user.map(|u| u.login).unwrap_or_default(),
            created_at: pr.created_at,
            merged: pr.merged_at.is_some(),
            merged_at: pr.merged_at,
            state: pr.state,
            comments,
            files: files
                .into_iter()
                .map(|f| PrFileDiff {
                    filename: f.filename,
                    status: f.status,
                    additions: f.additions,
                    deletions: f.deletions,
                    changes: f.changes,
                    patch: f.patch,
                })
                .collect(),
            embedding: response.embedding,
            text,
        })
    }
}
