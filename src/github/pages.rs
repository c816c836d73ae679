use serde::de::DeserializeOwned;
use tracing::debug;

use super::{FetchError, Fetched, GitHubClient};

/// Lazily walks a paginated listing by following `rel="next"` links.
///
/// The query parameters are only sent with the first request; GitHub's next
/// links already carry them. Each page is fetched at most once, and the walk
/// ends when a response has no next link.
pub struct Pages<'a> {
    client: &'a GitHubClient,
    next: Option<String>,
    query: Vec<(String, String)>,
    fetched: usize,
}

impl<'a> Pages<'a> {
    pub fn new(client: &'a GitHubClient, url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            client,
            next: Some(url.into()),
            query,
            fetched: 0,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page<T: DeserializeOwned>(&mut self) -> Result<Option<Vec<T>>, FetchError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        let query = std::mem::take(&mut self.query);
        let Fetched { body, next } = self.client.fetch::<Vec<T>>(&url, &query).await?;
        self.fetched += 1;
        debug!(page = self.fetched, items = body.len(), has_next = next.is_some(), "fetched page");
        self.next = next;
        Ok(Some(body))
    }

    /// Drain every remaining page into one vector.
    pub async fn collect_all<T: DeserializeOwned>(mut self) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page::<T>().await? {
            items.extend(page);
        }
        Ok(items)
    }
}
