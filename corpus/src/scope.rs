//! Repository scope and URL parsing.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PrContextError, Result};

/// `scheme://host/org/repo[.git][/...]`; query strings and fragments end the
/// repo segment.
const REPO_URL_PATTERN: &str =
    r"^[A-Za-z][A-Za-z0-9+.-]*://([^/?#]+)/([^/?#]+)/([^/?#]+?)(?:\.git)?(?:[/?#].*)?$";

fn repo_url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(REPO_URL_PATTERN).ok()).as_ref()
}

/// The `(domain, org, repo)` triple a search is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoScope {
    pub domain: String,
    pub org: String,
    pub repo: String,
}

impl RepoScope {
    pub fn new(domain: impl Into<String>, org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            org: org.into(),
            repo: repo.into(),
        }
    }

    /// Parse a repository or pull request URL.
    ///
    /// Returns `None` when the URL has no `/org/repo` segment.
    pub fn parse(url: &str) -> Option<Self> {
        let caps = repo_url_regex()?.captures(url.trim())?;
        Some(Self::new(&caps[1], &caps[2], &caps[3]))
    }

    /// Like [`RepoScope::parse`], but reports a precondition failure. Used
    /// where a bad URL must stop the run.
    pub fn parse_required(url: &str) -> Result<Self> {
        Self::parse(url).ok_or_else(|| {
            PrContextError::Precondition(format!(
                "repository URL must look like scheme://host/org/repo, got {url:?}"
            ))
        })
    }

    /// Web URL of pull request `pr_id` in this repository.
    pub fn pull_url(&self, pr_id: u64) -> String {
        format!(
            "https://{}/{}/{}/pull/{pr_id}",
            self.domain, self.org, self.repo
        )
    }
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.org, self.repo)
    }
}
