//! End-to-end search pipeline.
//!
//! Search → fetch → normalize → store → relevance-filter → refine →
//! analyze. Per-source failures degrade to "no content for this source";
//! only storage open and the initial SERP query are fatal.

use std::path::PathBuf;

use moonscrape_fetch::{PageFetcher, SerpClient, SerpQuery};
use moonscrape_normalize::Normalizer;
use moonscrape_shared::{FetchConfig, GenerationConfig, Result};
use moonscrape_storage::Storage;
use tracing::{debug, info, warn};

use crate::llm::LlmClient;
use crate::refine::{RefineConfig, Summary};
use crate::{analyze, refine, relevance};

/// Everything a single search run needs.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub keyword: String,
    pub max_results: usize,
    pub language_code: String,
    pub location_code: u32,
    pub serp_base_url: String,
    pub serp_login: String,
    pub serp_password: String,
    pub generation: GenerationConfig,
    pub fetch: FetchConfig,
    pub refine: RefineConfig,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    /// Allow fetching from localhost (for integration tests with mock servers).
    pub allow_local_fetch: bool,
}

/// What a completed run produced.
#[derive(Debug)]
pub struct SearchOutcome {
    pub keyword: String,
    pub sources_found: usize,
    pub sources_stored: usize,
    pub sources_relevant: usize,
    pub summary: Option<Summary>,
    pub report_path: Option<PathBuf>,
}

/// Progress callbacks for long-running search phases.
pub trait ProgressReporter {
    fn phase(&self, _message: &str) {}
    fn source_fetched(&self, _url: &str, _stored: bool) {}
    fn source_filtered(&self, _url: &str, _relevant: bool) {}
    fn epoch_scored(&self, _epoch: u32, _score: f64) {}
    fn done(&self, _outcome: &SearchOutcome) {}
}

/// No-op reporter for tests and library callers.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {}

/// Run the full pipeline for one keyword.
pub async fn run_search(
    config: &SearchConfig,
    progress: &dyn ProgressReporter,
) -> Result<SearchOutcome> {
    progress.phase("opening storage");
    let storage = Storage::open(&config.db_path).await?;

    progress.phase("searching");
    let serp = SerpClient::new(
        &config.serp_base_url,
        config.serp_login.clone(),
        config.serp_password.clone(),
    )?;
    let urls = serp
        .search(&SerpQuery {
            keyword: config.keyword.clone(),
            language_code: config.language_code.clone(),
            location_code: config.location_code,
            max_results: config.max_results,
        })
        .await?;
    info!(keyword = %config.keyword, found = urls.len(), "search complete");

    progress.phase("fetching pages");
    let mut fetcher = PageFetcher::new(&config.fetch)?;
    if config.allow_local_fetch {
        fetcher = fetcher.allow_localhost();
    }
    let normalizer = Normalizer::new();

    let stored_urls = ingest_sources(&storage, &fetcher, &normalizer, &urls, progress).await;
    info!(stored = stored_urls.len(), "fetch phase complete");

    progress.phase("filtering for relevance");
    let llm = LlmClient::new(&config.generation)?;
    let relevant = relevance::filter_sources(
        &llm,
        &storage,
        &stored_urls,
        &config.keyword,
        |url, relevant| progress.source_filtered(url, relevant),
    )
    .await;

    let mut outcome = SearchOutcome {
        keyword: config.keyword.clone(),
        sources_found: urls.len(),
        sources_stored: stored_urls.len(),
        sources_relevant: relevant.len(),
        summary: None,
        report_path: None,
    };

    if relevant.is_empty() {
        info!("no relevant content, skipping refinement");
        progress.done(&outcome);
        return Ok(outcome);
    }

    progress.phase("refining summary");
    let corpus = relevant.join("\n\n");
    let summary = refine::refine(
        &llm,
        &corpus,
        &config.keyword,
        &config.refine,
        |epoch, score| progress.epoch_scored(epoch, score),
    )
    .await?;

    if let Some(summary) = &summary {
        if let Err(e) = storage
            .insert_report(&config.keyword, &summary.text, summary.score)
            .await
        {
            warn!(error = %e, "failed to record report row");
        }

        progress.phase("analyzing");
        match analyze::analyze_summary(&llm, &summary.text).await {
            Ok(report) => match analyze::write_report(&config.output_dir, &report) {
                Ok(path) => outcome.report_path = Some(path),
                Err(e) => warn!(error = %e, "failed to write analysis report"),
            },
            Err(e) => warn!(error = %e, "analysis failed, keeping summary"),
        }
    }

    outcome.summary = summary;
    progress.done(&outcome);
    Ok(outcome)
}

/// Fetch, normalize, and store each URL, returning the URLs whose content
/// made it into storage. Every per-source failure, including a failed
/// database write, is logged and skips that source only.
async fn ingest_sources(
    storage: &Storage,
    fetcher: &PageFetcher,
    normalizer: &Normalizer,
    urls: &[url::Url],
    progress: &dyn ProgressReporter,
) -> Vec<url::Url> {
    let mut stored_urls = Vec::new();
    for url in urls {
        match fetcher.fetch(url).await {
            Ok(raw) => match normalizer.normalize(&raw) {
                Some(doc) => match store_source(storage, url.as_str(), &doc.to_markdown()).await {
                    Ok(()) => {
                        progress.source_fetched(url.as_str(), true);
                        stored_urls.push(url.clone());
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "storing content failed, skipping source");
                        progress.source_fetched(url.as_str(), false);
                    }
                },
                None => {
                    debug!(%url, "no usable content");
                    progress.source_fetched(url.as_str(), false);
                }
            },
            Err(e) => {
                warn!(%url, error = %e, "fetch failed, skipping source");
                progress.source_fetched(url.as_str(), false);
            }
        }
    }
    stored_urls
}

async fn store_source(storage: &Storage, url: &str, markdown: &str) -> Result<()> {
    let source_id = storage.insert_source(url).await?;
    storage.save_content(&source_id, markdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    /// Scores 1.0 at epoch 1, ending refinement after one call.
    fn perfect_summary() -> String {
        let filler = "Detailed factual material about the milestone. ".repeat(12);
        format!(
            "### Executive Summary\n{filler}\n\
             ### Key Findings\nCore facts.\n\
             ### Detailed Analysis\n{filler}\n\
             ### Recommendations\nNext steps.\n\
             ### Sources\n- one"
        )
    }

    fn test_config(server: &MockServer, workdir: &std::path::Path) -> SearchConfig {
        SearchConfig {
            keyword: "quantum computing milestone".into(),
            max_results: 10,
            language_code: "en".into(),
            location_code: 2840,
            serp_base_url: server.uri(),
            serp_login: "login".into(),
            serp_password: "password".into(),
            generation: GenerationConfig {
                base_url: server.uri(),
                api_key: "test-key".into(),
                model: "x-ai/grok-2-1212".into(),
                temperature: 0.2,
                max_tokens: 5000,
            },
            fetch: FetchConfig {
                timeout_secs: 5,
                retries: 1,
                backoff_ms: 1,
            },
            refine: RefineConfig::default(),
            db_path: workdir.join("moonscrape.db"),
            output_dir: workdir.to_path_buf(),
            allow_local_fetch: true,
        }
    }

    #[tokio::test]
    async fn full_run_produces_summary_and_report() {
        let server = MockServer::start().await;
        let workdir =
            std::env::temp_dir().join(format!("moonscrape_test_{}", uuid::Uuid::now_v7()));

        // One organic result pointing back at the mock server, one dead page
        let serp_body = serde_json::json!({
            "tasks": [{
                "result": [{
                    "items": [
                        {"url": format!("{}/article", server.uri())},
                        {"url": format!("{}/missing", server.uri())}
                    ],
                    "metrics": {"pagination": {"total": 1}}
                }]
            }]
        });
        Mock::given(method("POST"))
            .and(path("/v3/serp/google/organic/live/advanced"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&serp_body))
            .mount(&server)
            .await;

        let article = std::fs::read_to_string(
            std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../../../fixtures/html/article.html"),
        )
        .unwrap();
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(article))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // Relevance filter call, then one refinement epoch, then analysis
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Now analyze this content"))
            .respond_with(completion("### Findings\n\nQubit counts doubled."))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Epoch Focus"))
            .respond_with(completion(&perfect_summary()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("comprehensive SEO analysis"))
            .respond_with(completion("1. Opportunities..."))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server, &workdir);
        let outcome = run_search(&config, &SilentProgress).await.unwrap();

        assert_eq!(outcome.sources_found, 2);
        assert_eq!(outcome.sources_stored, 1);
        assert_eq!(outcome.sources_relevant, 1);

        let summary = outcome.summary.expect("summary");
        assert_eq!(summary.score, 1.0);
        assert_eq!(summary.epoch, 1);

        let report_path = outcome.report_path.expect("report path");
        assert!(
            std::fs::read_to_string(&report_path)
                .unwrap()
                .contains("Opportunities")
        );

        // The run is recorded as a report row
        let storage = Storage::open(&config.db_path).await.unwrap();
        let reports = storage.list_reports().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].keyword, "quantum computing milestone");
    }

    #[tokio::test]
    async fn run_without_relevant_content_skips_refinement() {
        let server = MockServer::start().await;
        let workdir =
            std::env::temp_dir().join(format!("moonscrape_test_{}", uuid::Uuid::now_v7()));

        let serp_body = serde_json::json!({
            "tasks": [{
                "result": [{
                    "items": [{"url": format!("{}/article", server.uri())}],
                    "metrics": {"pagination": {"total": 1}}
                }]
            }]
        });
        Mock::given(method("POST"))
            .and(path("/v3/serp/google/organic/live/advanced"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&serp_body))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><h1>T</h1><p>Hello world</p></body></html>"),
            )
            .mount(&server)
            .await;
        // The filter finds nothing; refinement and analysis never run
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(completion("No relevant content found"))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server, &workdir);
        let outcome = run_search(&config, &SilentProgress).await.unwrap();

        assert_eq!(outcome.sources_stored, 1);
        assert_eq!(outcome.sources_relevant, 0);
        assert!(outcome.summary.is_none());
        assert!(outcome.report_path.is_none());
    }

    #[tokio::test]
    async fn storage_write_failure_skips_the_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><h1>T</h1><p>Hello world</p></body></html>"),
            )
            .mount(&server)
            .await;

        // Migrate a database, then reopen it read-only so every write fails
        let db_path =
            std::env::temp_dir().join(format!("moonscrape_test_{}.db", uuid::Uuid::now_v7()));
        drop(Storage::open(&db_path).await.unwrap());
        let storage = Storage::open_readonly(&db_path).await.unwrap();

        let fetcher = PageFetcher::new(&FetchConfig {
            timeout_secs: 5,
            retries: 1,
            backoff_ms: 1,
        })
        .unwrap()
        .allow_localhost();
        let urls = [url::Url::parse(&format!("{}/article", server.uri())).unwrap()];

        let stored = ingest_sources(
            &storage,
            &fetcher,
            &Normalizer::new(),
            &urls,
            &SilentProgress,
        )
        .await;

        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn serp_failure_is_fatal() {
        let server = MockServer::start().await;
        let workdir =
            std::env::temp_dir().join(format!("moonscrape_test_{}", uuid::Uuid::now_v7()));

        Mock::given(method("POST"))
            .and(path("/v3/serp/google/organic/live/advanced"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = test_config(&server, &workdir);
        let err = run_search(&config, &SilentProgress).await.unwrap_err();

        assert!(err.to_string().contains("500"));
    }
}
