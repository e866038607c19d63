use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pr_context_corpus::CorpusStore;
use pr_context_embeddings::EmbeddingProvider;
use pr_context_server::http;
use pr_context_server::{SearchService, ServiceConfig, StdioSearchTools};
use rmcp::ServiceExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Serve similar-PR search over MCP.
#[derive(Debug, Parser)]
#[clap(author, name = "pr-context-server", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Corpus file written by pr-context-ingest.
    #[clap(long, global = true)]
    corpus: Option<PathBuf>,

    /// Number of similar PRs returned per query.
    #[clap(long = "top-k", global = true)]
    top_k: Option<usize>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Streamable HTTP endpoint at /mcp with a /health probe.
    Http {
        /// Listen address.
        #[clap(long)]
        bind: Option<String>,
    },
    /// MCP over stdin/stdout.
    Stdio,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol in stdio mode.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = ServiceConfig::from_env();
    if let Some(corpus) = cli.corpus {
        config.corpus_path = corpus;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }

    let store = CorpusStore::load(&config.corpus_path)
        .await
        .with_context(|| format!("cannot start without corpus {}", config.corpus_path.display()))?;
    if store.is_empty() {
        warn!("Corpus {} has no records", config.corpus_path.display());
    }

    let provider = config.embedding.provider();
    if !provider.is_available() {
        warn!("No embedding API key configured; every search will fail");
    }

    let service = SearchService::new(Arc::new(store), Arc::new(provider))
        .with_embed_timeout(config.embedding.timeout())
        .with_top_k(config.top_k);

    match cli.command {
        Command::Http { bind } => {
            let bind_addr = bind.unwrap_or(config.bind_addr);
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind {bind_addr}"))?;
            http::serve(listener, service).await?;
        }
        Command::Stdio => {
            info!("Serving MCP over stdio");
            let running = StdioSearchTools::new(service)
                .serve(rmcp::transport::stdio())
                .await?;
            running.waiting().await?;
        }
    }

    Ok(())
}
