//! DataForSEO organic-search retrieval.
//!
//! Posts a keyword task to the live advanced endpoint, filters out
//! blacklisted social/video domains, and paginates until enough valid
//! result URLs are collected.

use moonscrape_shared::{MoonscrapeError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

const SERP_ENDPOINT: &str = "/v3/serp/google/organic/live/advanced";

/// Domains whose results are discarded before fetching.
pub const BLACKLISTED_DOMAINS: &[&str] = &[
    "reddit.com",
    "youtube.com",
    "vimeo.com",
    "tiktok.com",
    "twitter.com",
    "facebook.com",
    "instagram.com",
    "quora.com",
    "pinterest.com",
];

/// A single keyword search request.
#[derive(Debug, Clone)]
pub struct SerpQuery {
    pub keyword: String,
    pub language_code: String,
    pub location_code: u32,
    /// Stop paginating once this many valid URLs are collected.
    pub max_results: usize,
}

/// Client for the DataForSEO SERP API.
pub struct SerpClient {
    http: Client,
    base_url: String,
    login: String,
    password: String,
}

impl SerpClient {
    pub fn new(base_url: impl Into<String>, login: String, password: String) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| MoonscrapeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            login,
            password,
        })
    }

    /// Search for a keyword and return valid organic result URLs.
    ///
    /// Follow-up pages are requested while fewer than `max_results` valid
    /// URLs have been collected and the API reports more pages. A failed
    /// follow-up page stops pagination but keeps what was already found.
    pub async fn search(&self, query: &SerpQuery) -> Result<Vec<Url>> {
        let first = self.request_page(query, None).await?;
        let total_pages = first.total_pages();
        let mut urls = collect_valid_urls(&first);
        debug!(
            keyword = %query.keyword,
            found = urls.len(),
            total_pages,
            "first results page processed"
        );

        let mut page = 1;
        while urls.len() < query.max_results && page < total_pages {
            page += 1;
            match self.request_page(query, Some(page)).await {
                Ok(result) => urls.extend(collect_valid_urls(&result)),
                Err(e) => {
                    warn!(keyword = %query.keyword, page, error = %e, "follow-up page failed");
                    break;
                }
            }
        }

        urls.truncate(query.max_results);
        Ok(urls)
    }

    async fn request_page(&self, query: &SerpQuery, page: Option<u32>) -> Result<SerpResult> {
        let payload = [SerpTaskRequest {
            language_code: &query.language_code,
            location_code: query.location_code,
            keyword: &query.keyword,
            page,
        }];

        let response = self
            .http
            .post(format!("{}{SERP_ENDPOINT}", self.base_url))
            .basic_auth(&self.login, Some(&self.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| MoonscrapeError::Network(format!("SERP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoonscrapeError::Network(format!(
                "SERP API returned HTTP {status}: {body}"
            )));
        }

        let parsed: SerpResponse = response
            .json()
            .await
            .map_err(|e| MoonscrapeError::parse(format!("invalid SERP response: {e}")))?;

        parsed
            .tasks
            .into_iter()
            .next()
            .and_then(|task| task.result.into_iter().next())
            .ok_or_else(|| MoonscrapeError::validation("no search results found"))
    }
}

/// Reject empty, unparsable, and blacklisted-domain URLs.
pub fn is_valid_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    !BLACKLISTED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

fn collect_valid_urls(result: &SerpResult) -> Vec<Url> {
    result
        .items
        .iter()
        .filter_map(|item| item.url.as_deref())
        .filter(|u| is_valid_url(u))
        .filter_map(|u| Url::parse(u).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SerpTaskRequest<'a> {
    language_code: &'a str,
    location_code: u32,
    keyword: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    tasks: Vec<SerpTask>,
}

#[derive(Debug, Deserialize)]
struct SerpTask {
    #[serde(default)]
    result: Vec<SerpResult>,
}

#[derive(Debug, Deserialize)]
struct SerpResult {
    #[serde(default)]
    items: Vec<SerpItem>,
    metrics: Option<SerpMetrics>,
}

impl SerpResult {
    fn total_pages(&self) -> u32 {
        self.metrics
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .map(|p| p.total)
            .unwrap_or(1)
    }
}

#[derive(Debug, Deserialize)]
struct SerpItem {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpMetrics {
    pagination: Option<SerpPagination>,
}

#[derive(Debug, Deserialize)]
struct SerpPagination {
    total: u32,
}
