pub mod sink;

pub use sink::{load_processed_ids, JsonlSink, SinkError};

use std::collections::{HashSet, VecDeque};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

use crate::github::{FetchError, GitHubClient, Pages};
use crate::pr::{Enricher, EnrichedPullRequest, PrError, PullRequestSummary, RepoRef};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Failed to fetch pull request listing: {0}")]
    Listing(#[from] FetchError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Run parameters for one collection pass.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Target total of records in the sink, counting ones from earlier runs
    pub max_prs: usize,
    /// Maximum number of pull requests enriched concurrently
    pub workers: usize,
    pub per_page: u32,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            max_prs: 2000,
            workers: 5,
            per_page: 100,
        }
    }
}

/// What a collection pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    /// Records already in the sink when the run started
    pub previously_processed: usize,
    /// Records appended by this run
    pub appended: usize,
    /// Pull requests whose enrichment failed; they stay unrecorded
    pub failed: usize,
}

type TaskOutput = (u64, Result<EnrichedPullRequest, PrError>);

/// Drives the listing walk, the bounded enrichment pool and the sink.
///
/// Only the collector writes to the sink. A task is only spawned while
/// `processed + appended + in_flight < max_prs`, so draining every in-flight
/// task can never overshoot the target.
pub struct Collector {
    client: GitHubClient,
    repo: RepoRef,
    sink: JsonlSink,
    options: CollectOptions,
}

impl Collector {
    pub fn new(client: GitHubClient, repo: RepoRef, sink: JsonlSink, options: CollectOptions) -> Self {
        Self {
            client,
            repo,
            sink,
            options,
        }
    }

    pub async fn run(&self, processed: &HashSet<u64>) -> Result<CollectSummary, CollectError> {
        let span = info_span!("collect", repo = %self.repo, max_prs = self.options.max_prs);
        self.run_inner(processed).instrument(span).await
    }

    async fn run_inner(&self, processed: &HashSet<u64>) -> Result<CollectSummary, CollectError> {
        let max_prs = self.options.max_prs;
        let workers = self.options.workers.max(1);
        let mut summary = CollectSummary {
            previously_processed: processed.len(),
            ..CollectSummary::default()
        };

        if processed.len() >= max_prs {
            info!(processed = processed.len(), "already processed {max_prs} PRs, nothing to do");
            return Ok(summary);
        }
        let remaining = max_prs - processed.len();

        let enricher = Enricher::new(self.client.clone(), self.repo.clone(), self.options.per_page);
        let listing_url = format!(
            "{}/repos/{}/{}/pulls",
            self.client.api_url(),
            self.repo.owner,
            self.repo.repo
        );
        let mut pages = Pages::new(
            &self.client,
            listing_url,
            vec![
                ("state".to_string(), "closed".to_string()),
                ("per_page".to_string(), self.options.per_page.to_string()),
            ],
        );

        let mut candidates: VecDeque<PullRequestSummary> = VecDeque::new();
        let mut scheduled: HashSet<u64> = HashSet::new();
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut exhausted = false;
        let mut listing_error: Option<FetchError> = None;

        loop {
            while listing_error.is_none()
                && tasks.len() < workers
                && processed.len() + summary.appended + tasks.len() < max_prs
            {
                let Some(candidate) = candidates.pop_front() else {
                    if exhausted {
                        break;
                    }
                    match pages.next_page::<PullRequestSummary>().await {
                        Ok(Some(page)) => {
                            let eligible = page.into_iter().filter(|pr| {
                                pr.is_merged() && !processed.contains(&pr.id) && scheduled.insert(pr.id)
                            });
                            candidates.extend(eligible);
                        }
                        Ok(None) => exhausted = true,
                        Err(e) => {
                            error!(error = %e, "listing fetch failed, draining in-flight work");
                            listing_error = Some(e);
                        }
                    }
                    continue;
                };

                let enricher = enricher.clone();
                let id = candidate.id;
                let span = info_span!("enrich", pr_id = id);
                tasks.spawn(
                    async move {
                        let result = enricher.enrich(&candidate.url).await;
                        (id, result)
                    }
                    .instrument(span),
                );
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((_, Ok(record))) => {
                    self.sink.append(&record)?;
                    summary.appended += 1;
                    info!(
                        id = record.id,
                        "fetched and saved PR: {}/{}", summary.appended, remaining
                    );
                }
                Ok((id, Err(e))) => {
                    summary.failed += 1;
                    error!(pr_id = id, error = %e, "error fetching PR details");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "enrichment task did not complete");
                }
            }
        }

        if let Some(e) = listing_error {
            return Err(e.into());
        }
        if summary.appended < remaining {
            warn!(appended = summary.appended, remaining, "listing exhausted before reaching target");
        }
        Ok(summary)
    }
}
