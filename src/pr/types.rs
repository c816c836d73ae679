use serde::{Deserialize, Serialize};

/// Minimal projection of an entry on the pull request listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    pub id: u64,
    /// API URL of the pull request detail endpoint
    pub url: String,
    #[serde(default)]
    pub merged_at: Option<String>,
}

impl PullRequestSummary {
    pub fn is_merged(&self) -> bool {
        self.merged_at.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// Pull request detail as returned by `GET /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullDetail {
    pub id: u64,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub merged_at: Option<String>,
}

/// Issue as returned by `GET /repos/{owner}/{repo}/issues/{number}`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueResponse {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// One entry of `GET /repos/{owner}/{repo}/pulls/{number}/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub additions: u64,
    pub deletions: u64,
    /// Absent for binary files and very large diffs
    #[serde(default)]
    pub patch: Option<String>,
}

/// Snapshot of an issue referenced from a pull request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDetail {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
}

impl From<IssueResponse> for IssueDetail {
    fn from(issue: IssueResponse) -> Self {
        Self {
            id: issue.id,
            title: issue.title,
            description: issue.body,
        }
    }
}

/// Line-level view of one file's patch.
///
/// `additions_lines[i]` is the target-file line number of `addition_content[i]`,
/// and `deletions_lines[i]` the source-file line number of `deletion_content[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    pub additions_lines: Vec<usize>,
    pub deletions_lines: Vec<usize>,
    pub addition_content: Vec<String>,
    pub deletion_content: Vec<String>,
}

/// A changed file within an enriched pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    /// Totals reported by the API, independent of patch availability
    pub additions: u64,
    pub deletions: u64,
    pub additions_lines: Vec<usize>,
    pub deletions_lines: Vec<usize>,
    pub addition_content: Vec<String>,
    pub deletion_content: Vec<String>,
}

impl FileChange {
    pub fn new(entry: FileEntry, lines: LineInfo) -> Self {
        Self {
            filename: entry.filename,
            additions: entry.additions,
            deletions: entry.deletions,
            additions_lines: lines.additions_lines,
            deletions_lines: lines.deletions_lines,
            addition_content: lines.addition_content,
            deletion_content: lines.deletion_content,
        }
    }
}

/// The unit of output: one line of the JSONL sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPullRequest {
    pub id: u64,
    pub title: String,
    pub body: Option<String>,
    pub created_at: String,
    pub merged_at: Option<String>,
    pub associated_issues: Vec<IssueDetail>,
    pub changes: Vec<FileChange>,
}

/// Repository identity the collector runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
