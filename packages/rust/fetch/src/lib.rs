//! Page retrieval for the research pipeline.
//!
//! [`PageFetcher`] downloads raw HTML with a bounded retry policy and
//! refuses to touch private or loopback addresses. SERP retrieval lives
//! in [`serp`].

pub mod serp;

pub use serp::{SerpClient, SerpQuery};

use std::net::IpAddr;
use std::time::Duration;

use moonscrape_shared::{FetchConfig, MoonscrapeError, RawDocument, Result};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("moonscrape/", env!("CARGO_PKG_VERSION"));

/// HTTP fetcher for result pages.
pub struct PageFetcher {
    client: Client,
    retries: u32,
    backoff: Duration,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl PageFetcher {
    /// Create a fetcher with the given retry policy.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MoonscrapeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            retries: config.retries.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
            allow_localhost: false,
        })
    }

    /// Allow localhost targets (for integration tests with mock servers).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Download a page, retrying transient failures with linear backoff.
    ///
    /// Client errors (4xx) fail immediately; network errors and server
    /// errors (5xx) are retried up to the configured attempt count.
    pub async fn fetch(&self, url: &Url) -> Result<RawDocument> {
        if !self.allow_localhost && is_ssrf_target(url) {
            warn!(%url, "SSRF protection: blocked");
            return Err(MoonscrapeError::Network(format!(
                "{url}: blocked private or non-HTTP target"
            )));
        }

        let mut last_err = None;
        for attempt in 1..=self.retries {
            match self.fetch_once(url).await {
                Ok(doc) => return Ok(doc),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retryable(e)) => {
                    debug!(%url, attempt, error = %e, "fetch attempt failed");
                    last_err = Some(e);
                    if attempt < self.retries {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| MoonscrapeError::Network(format!("{url}: no attempts made"))))
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<RawDocument, Attempt> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Attempt::Retryable(MoonscrapeError::Network(format!("{url}: {e}"))))?;

        let status = response.status();
        if !status.is_success() {
            let err = MoonscrapeError::Network(format!("{url}: HTTP {status}"));
            if status.is_server_error() {
                return Err(Attempt::Retryable(err));
            }
            return Err(Attempt::Fatal(err));
        }

        let body = response.text().await.map_err(|e| {
            Attempt::Retryable(MoonscrapeError::Network(format!(
                "{url}: body read failed: {e}"
            )))
        })?;

        Ok(RawDocument {
            url: url.to_string(),
            body,
        })
    }
}

enum Attempt {
    Retryable(MoonscrapeError),
    Fatal(MoonscrapeError),
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost" || host == "[::1]" || host.ends_with(".local") {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
