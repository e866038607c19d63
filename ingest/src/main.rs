use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pr_context_embeddings::OpenAIProvider;
use pr_context_ingest::{DEFAULT_MAX_PRS, DEFAULT_OUTPUT, IngestOptions, run_ingest};
use tracing_subscriber::EnvFilter;

/// Build a pull request similarity corpus from a GitHub repository.
#[derive(Debug, Parser)]
#[clap(author, name = "pr-context-ingest", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Repository URL, e.g. https://github.com/org/repo
    #[clap(long = "repo-url", value_name = "URL")]
    repo_url: String,

    /// GitHub access token.
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Where to write the NDJSON corpus.
    #[clap(long, short = 'o', default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Maximum number of pull requests to ingest.
    #[clap(long = "max-pr", default_value_t = DEFAULT_MAX_PRS)]
    max_pr: usize,

    /// Override the GitHub REST API base URL.
    #[clap(long = "api-base-url", value_name = "URL")]
    api_base_url: Option<String>,

    /// Embedding API key.
    #[clap(long = "openai-api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Embedding API base URL.
    #[clap(
        long = "embedding-base-url",
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    embedding_base_url: String,

    /// Embedding model.
    #[clap(
        long = "embedding-model",
        env = "PR_CONTEXT_EMBEDDING_MODEL",
        default_value = "text-embedding-3-small"
    )]
    embedding_model: String,

    /// Seconds to wait for each embedding call.
    #[clap(
        long = "embed-timeout-secs",
        env = "PR_CONTEXT_EMBED_TIMEOUT_SECS",
        default_value_t = 30
    )]
    embed_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut provider = OpenAIProvider::new()
        .with_base_url(cli.embedding_base_url)
        .with_model(cli.embedding_model);
    if let Some(key) = cli.openai_api_key {
        provider = provider.with_api_key(key);
    }

    let options = IngestOptions {
        repo_url: cli.repo_url,
        token: cli.token,
        output: cli.output,
        max_prs: cli.max_pr,
        api_base_url: cli.api_base_url,
        embed_timeout: Duration::from_secs(cli.embed_timeout_secs),
    };

    match run_ingest(&options, &provider).await {
        Ok(report) => {
            tracing::info!(
                "Saved {} PRs to {}",
                report.records,
                report.output.display()
            );
            println!("{}", report.records);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Ingestion failed ({:?}): {e}", e.kind());
            Err(e.into())
        }
    }
}
