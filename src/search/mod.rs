//! Repository discovery through the forge search API
//!
//! The client walks result pages in order, most-starred first, until it has
//! enough repositories, the result set runs out, or the page ceiling is hit.
//! API and transport failures stop pagination but keep what was gathered;
//! only a rejected credential is reported as [`SearchError::Auth`].

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::types::{Event, RepositoryDescriptor, SearchQuery};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Media type requested from the API
const ACCEPT_HEADER: &str = "application/vnd.github+json";

/// One page of the search response
#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<ApiRepository>,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    full_name: String,
    clone_url: String,
    #[serde(default)]
    stargazers_count: u64,
    owner: ApiOwner,
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

impl From<ApiRepository> for RepositoryDescriptor {
    fn from(item: ApiRepository) -> Self {
        RepositoryDescriptor {
            name: item.name,
            full_name: item.full_name,
            clone_url: item.clone_url,
            stars: item.stargazers_count,
            owner: item.owner.login,
        }
    }
}

/// What a search produced
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    /// Unique descriptors, most-starred first, at most the requested count
    pub repositories: Vec<RepositoryDescriptor>,
    /// Number of page requests issued
    pub pages_requested: u32,
    /// Condition that stopped pagination early, if any
    pub interruption: Option<SearchError>,
}

impl SearchResults {
    /// Whether the credential was rejected
    pub fn auth_failed(&self) -> bool {
        matches!(self.interruption, Some(SearchError::Auth))
    }
}

/// Paginating client for the repository search endpoint
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    config: SearchConfig,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl SearchClient {
    /// Build a client; every request is bounded by `config.request_timeout`
    pub fn new(config: SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            event_tx: None,
        })
    }

    /// Publish page events on `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Collect up to `query.count()` repositories for `query.text()`
    pub async fn search(&self, query: &SearchQuery) -> SearchResults {
        let limit = query.count();
        info!(query = %query.text(), limit, "searching repositories");

        let mut found: Vec<RepositoryDescriptor> = Vec::with_capacity(limit.min(1000));
        let mut seen: HashSet<String> = HashSet::new();
        let mut interruption = None;
        let mut pages_requested = 0u32;
        let mut page = 1u32;

        while found.len() < limit && page <= self.config.max_pages {
            pages_requested += 1;
            let items = match self.fetch_page(query, page).await {
                Ok(items) => items,
                Err(e) => {
                    if e.is_fatal() {
                        warn!(page, error = %e, "search aborted");
                    } else {
                        warn!(page, error = %e, "search stopped early, keeping partial results");
                    }
                    self.emit(Event::SearchInterrupted {
                        reason: e.to_string(),
                    });
                    interruption = Some(e);
                    break;
                }
            };

            let received = items.len();
            if received == 0 {
                debug!(page, "result set exhausted");
                break;
            }

            for item in items {
                if !seen.insert(item.full_name.clone()) {
                    debug!(repo = %item.full_name, "duplicate across pages, ignoring");
                    continue;
                }
                found.push(item.into());
                if found.len() >= limit {
                    break;
                }
            }

            debug!(page, received, accumulated = found.len(), "search page received");
            self.emit(Event::SearchPage {
                page,
                items: received,
                accumulated: found.len(),
            });
            page += 1;
        }

        // Pagination order is not trusted; stable sort keeps API order for ties.
        found.sort_by(|a, b| b.stars.cmp(&a.stars));
        found.truncate(limit);

        info!(found = found.len(), "search complete");
        self.emit(Event::SearchComplete { found: found.len() });

        SearchResults {
            repositories: found,
            pages_requested,
            interruption,
        }
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> std::result::Result<Vec<ApiRepository>, SearchError> {
        let url = format!(
            "{}/search/repositories",
            self.config.api_url.trim_end_matches('/')
        );

        let mut request = self
            .http
            .get(&url)
            .query(&[("q", query.text()), ("sort", "stars"), ("order", "desc")])
            .query(&[("per_page", self.config.page_size), ("page", page)])
            .header(ACCEPT, ACCEPT_HEADER)
            .timeout(self.config.request_timeout);

        if let Some(credential) = query.credential() {
            request = request.header(AUTHORIZATION, format!("token {}", credential.expose()));
        }

        let response = request.send().await.map_err(|e| SearchError::Transport {
            page,
            message: e.to_string(),
        })?;

        if let Some(remaining) = response.headers().get("x-ratelimit-remaining") {
            debug!(page, remaining = ?remaining, "rate limit budget");
        }

        match response.status() {
            StatusCode::OK => {
                let body: SearchPage =
                    response.json().await.map_err(|e| SearchError::Transport {
                        page,
                        message: e.to_string(),
                    })?;
                Ok(body.items)
            }
            StatusCode::UNAUTHORIZED => Err(SearchError::Auth),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                Err(SearchError::RateLimited { page })
            }
            status => Err(SearchError::BadStatus {
                page,
                status: status.as_u16(),
            }),
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }
}
