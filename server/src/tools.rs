//! MCP tool adapters.
//!
//! Both bindings expose a single `search` tool over [`SearchService`]. They
//! differ only in how `files` arrives: comma-joined over streamable HTTP, a
//! string array over stdio. Failures are returned as error tool results so the
//! calling agent can react while the session stays up.

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Deserialize;

use crate::search::{SearchQuery, SearchService, render_outcome, split_files};

const INSTRUCTIONS: &str = "Finds historical pull requests similar to the one under review, \
     scoped to the same repository. Call 'search' with the PR URL, title, body and changed \
     files; each match comes back with its URL, description and review comments.";

/// Arguments of the streamable HTTP `search` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HttpSearchRequest {
    /// URL of the pull request or repository, e.g. https://github.com/org/repo/pull/12
    pub url: String,
    /// Pull request title
    pub title: String,
    /// Pull request description
    #[serde(default)]
    pub body: String,
    /// Changed file paths, comma-separated
    #[serde(default)]
    pub files: String,
}

impl From<HttpSearchRequest> for SearchQuery {
    fn from(request: HttpSearchRequest) -> Self {
        Self {
            files: split_files(&request.files),
            url: request.url,
            title: request.title,
            body: request.body,
        }
    }
}

/// Arguments of the stdio `search` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StdioSearchRequest {
    /// URL of the pull request or repository, e.g. https://github.com/org/repo/pull/12
    pub url: String,
    /// Pull request title
    pub title: String,
    /// Pull request description
    #[serde(default)]
    pub body: String,
    /// Changed file paths
    #[serde(default)]
    pub files: Vec<String>,
}

impl From<StdioSearchRequest> for SearchQuery {
    fn from(request: StdioSearchRequest) -> Self {
        Self {
            url: request.url,
            title: request.title,
            body: request.body,
            files: request.files,
        }
    }
}

async fn run_search(service: &SearchService, query: SearchQuery) -> CallToolResult {
    let result = service.search(&query).await;
    match render_outcome(&result) {
        Ok(payload) => CallToolResult::success(vec![Content::text(payload)]),
        Err(message) => CallToolResult::error(vec![Content::text(message)]),
    }
}

fn server_info() -> ServerInfo {
    ServerInfo {
        instructions: Some(INSTRUCTIONS.into()),
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation::from_build_env(),
        ..Default::default()
    }
}

/// `search` over streamable HTTP.
#[derive(Clone)]
pub struct HttpSearchTools {
    service: SearchService,
    tool_router: ToolRouter<Self>,
}

impl HttpSearchTools {
    pub fn new(service: SearchService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl HttpSearchTools {
    #[tool(
        description = "Find past pull requests in the same repository that resemble this one. Returns a JSON array of {url, title, body, comments}."
    )]
    async fn search(
        &self,
        Parameters(request): Parameters<HttpSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(run_search(&self.service, request.into()).await)
    }
}

#[tool_handler]
impl ServerHandler for HttpSearchTools {
    fn get_info(&self) -> ServerInfo {
        server_info()
    }
}

/// `search` over stdio.
#[derive(Clone)]
pub struct StdioSearchTools {
    service: SearchService,
    tool_router: ToolRouter<Self>,
}

impl StdioSearchTools {
    pub fn new(service: SearchService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl StdioSearchTools {
    #[tool(
        description = "Find past pull requests in the same repository that resemble this one. Returns a JSON array of {url, title, body, comments}."
    )]
    async fn search(
        &self,
        Parameters(request): Parameters<StdioSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(run_search(&self.service, request.into()).await)
    }
}

#[tool_handler]
impl ServerHandler for StdioSearchTools {
    fn get_info(&self) -> ServerInfo {
        server_info()
    }
}
