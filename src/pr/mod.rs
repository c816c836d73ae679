pub mod diff;
pub mod types;

pub use types::{EnrichedPullRequest, PullRequestSummary, RepoRef};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::{FetchError, GitHubClient, Pages};
use types::{FileChange, FileEntry, IssueDetail, IssueResponse, PullDetail};

#[derive(Debug, Error)]
pub enum PrError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid repository: {0} (expected owner/repo or https://github.com/owner/repo)")]
    InvalidRepository(String),
}

/// Parse a repository identity.
///
/// Accepts `owner/repo` or `https://github.com/{owner}/{repo}` (a trailing
/// `.git` or extra path segments such as `/pulls` are ignored).
pub fn parse_repo(input: &str) -> Result<RepoRef, PrError> {
    let invalid = || PrError::InvalidRepository(input.to_string());
    let trimmed = input.trim();

    let segments: Vec<String> = if trimmed.contains("://") {
        let parsed = reqwest::Url::parse(trimmed).map_err(|_| invalid())?;
        if parsed.host_str() != Some("github.com") {
            return Err(invalid());
        }
        parsed
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|segment| !segment.is_empty())
            .take(2)
            .map(str::to_string)
            .collect()
    } else {
        trimmed.split('/').map(str::to_string).collect()
    };

    if segments.len() != 2 || segments.iter().any(|s| s.is_empty()) {
        return Err(invalid());
    }

    Ok(RepoRef {
        owner: segments[0].clone(),
        repo: segments[1].trim_end_matches(".git").to_string(),
    })
}

/// Issue numbers referenced as `#<digits>` in a pull request body, in order
/// of appearance. Repeated references are kept. Numbers stay as written, so a
/// reference too large for any real issue still reaches the API and fails there.
pub fn extract_linked_issues(body: Option<&str>) -> Vec<&str> {
    let Some(body) = body else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    let mut rest = body;
    while let Some(pos) = rest.find('#') {
        rest = &rest[pos + 1..];
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 {
            continue;
        }
        issues.push(&rest[..digits_len]);
        rest = &rest[digits_len..];
    }
    issues
}

/// Builds one fully enriched record per pull request: detail, linked issues,
/// and line-level file changes.
#[derive(Clone)]
pub struct Enricher {
    client: GitHubClient,
    repo: RepoRef,
    per_page: u32,
}

impl Enricher {
    pub fn new(client: GitHubClient, repo: RepoRef, per_page: u32) -> Self {
        Self {
            client,
            repo,
            per_page,
        }
    }

    /// Fetch everything about the pull request at `pr_url`.
    ///
    /// Any failed lookup (including a missing linked issue) aborts the whole
    /// record; nothing partial is returned.
    #[instrument(skip(self))]
    pub async fn enrich(&self, pr_url: &str) -> Result<EnrichedPullRequest, PrError> {
        let detail = self.client.fetch::<PullDetail>(pr_url, &[]).await?.body;
        debug!(id = detail.id, title = %detail.title, "received PR detail");

        let issue_numbers = extract_linked_issues(detail.body.as_deref());
        let mut associated_issues = Vec::with_capacity(issue_numbers.len());
        for number in issue_numbers {
            associated_issues.push(self.fetch_issue(number).await?);
        }

        let files_url = format!("{}/files", detail.url.trim_end_matches('/'));
        let files: Vec<FileEntry> = Pages::new(
            &self.client,
            files_url,
            vec![("per_page".to_string(), self.per_page.to_string())],
        )
        .collect_all()
        .await?;
        debug!(files = files.len(), issues = associated_issues.len(), "received PR files");

        let changes = files
            .into_iter()
            .map(|file| {
                let lines = diff::parse_patch(file.patch.as_deref());
                FileChange::new(file, lines)
            })
            .collect();

        Ok(EnrichedPullRequest {
            id: detail.id,
            title: detail.title,
            body: detail.body,
            created_at: detail.created_at,
            merged_at: detail.merged_at,
            associated_issues,
            changes,
        })
    }

    async fn fetch_issue(&self, number: &str) -> Result<IssueDetail, PrError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}",
            self.client.api_url(),
            self.repo.owner,
            self.repo.repo,
            number
        );
        let issue = self.client.fetch::<IssueResponse>(&url, &[]).await?.body;
        Ok(issue.into())
    }
}
