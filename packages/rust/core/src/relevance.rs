//! Intent-based relevance filtering.
//!
//! Each stored source is passed through one LLM call that extracts only
//! the passages answering the research intent. Sources with nothing
//! relevant are dropped; a failing call skips that source only.

use chrono::Utc;
use moonscrape_storage::Storage;
use tracing::{info, warn};
use url::Url;

use crate::llm::LlmClient;
use moonscrape_shared::Result;

/// Literal marker the model returns when nothing qualifies.
pub const NO_RELEVANT_CONTENT: &str = "No relevant content found";

/// Result of filtering a single source.
#[derive(Debug, Clone, PartialEq)]
pub enum RelevanceOutcome {
    /// Extracted passages, as markdown.
    Relevant(String),
    /// The model found nothing answering the intent.
    NothingFound,
}

/// Filter one source's content against the research intent.
///
/// Exactly one generation call per invocation.
pub async fn filter(llm: &LlmClient, content: &str, intent: &str) -> Result<RelevanceOutcome> {
    let prompt = build_filter_prompt(intent, content);
    let output = llm
        .complete(&prompt, llm.temperature(), llm.max_tokens())
        .await?;

    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == NO_RELEVANT_CONTENT {
        Ok(RelevanceOutcome::NothingFound)
    } else {
        Ok(RelevanceOutcome::Relevant(trimmed.to_string()))
    }
}

/// Filter every stored source, collecting the relevant extracts.
///
/// Content is read back through storage by URL. A missing row, a failed
/// content lookup, an empty outcome, or a failed generation call skips
/// that source; the batch always completes. `on_result` is invoked once
/// per source that had stored content, with whether it survived the
/// filter.
pub async fn filter_sources(
    llm: &LlmClient,
    storage: &Storage,
    urls: &[Url],
    intent: &str,
    mut on_result: impl FnMut(&str, bool),
) -> Vec<String> {
    let mut relevant = Vec::new();

    for url in urls {
        let content = match storage.get_content(url.as_str()).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!(%url, "no stored content, skipping");
                continue;
            }
            Err(e) => {
                warn!(%url, error = %e, "content lookup failed, skipping source");
                continue;
            }
        };

        match filter(llm, &content, intent).await {
            Ok(RelevanceOutcome::Relevant(extract)) => {
                info!(%url, chars = extract.len(), "relevant content found");
                on_result(url.as_str(), true);
                relevant.push(extract);
            }
            Ok(RelevanceOutcome::NothingFound) => {
                info!(%url, "no content matches the intent");
                on_result(url.as_str(), false);
            }
            Err(e) => {
                warn!(%url, error = %e, "relevance filtering failed, skipping source");
                on_result(url.as_str(), false);
            }
        }
    }

    relevant
}

fn build_filter_prompt(intent: &str, content: &str) -> String {
    let current_date = Utc::now().format("%Y-%m-%d").to_string();

    format!(
        "Let's analyze the user's intent:\n\
         \n\
         User query: {intent}\n\
         Current date: {current_date}\n\
         \n\
         What is the user probably asking about?\n\
         - The user seems to be looking for information about {intent}\n\
         - They likely want specific details rather than general information\n\
         - The content should directly answer their query with supporting facts\n\
         - They probably want the most up-to-date information available\n\
         \n\
         How should we filter the content?\n\
         - Look for sections that directly address {intent}\n\
         - Include 2-3 surrounding facts for context\n\
         - Prioritize data-driven information over opinions\n\
         - Focus on recent and authoritative sources\n\
         - Give higher priority to content with dates closest to {current_date}\n\
         - If dates are unavailable, prioritize content that appears most current\n\
         - Extract detailed key points with specific citations\n\
         \n\
         What should we exclude?\n\
         - Generic overviews that don't answer the specific query\n\
         - Outdated information (especially older than 1 year)\n\
         - Opinion pieces without factual support\n\
         - Content that only tangentially relates to the query\n\
         - Content with no clear publication date\n\
         \n\
         Now analyze this content:\n\
         {content}\n\
         \n\
         Extract only the sections that directly answer the user's prompt.\n\
         Include 2-3 surrounding facts/context for each relevant section.\n\
         Format the output as markdown with clear section headers.\n\
         \n\
         For each section include:\n\
         - Detailed key points with specific citations\n\
         - Supporting data and statistics\n\
         - Relevant quotes\n\
         - Source references\n\
         - Contextual information\n\
         \n\
         If no relevant content is found, return '{NO_RELEVANT_CONTENT}'."
    )
}
