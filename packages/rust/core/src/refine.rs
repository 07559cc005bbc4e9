//! Epoch-based summary refinement.
//!
//! Runs up to five refinement epochs over the filtered corpus. Each epoch
//! has a fixed focus directive and a slightly higher temperature, and each
//! candidate summary is scored deterministically. Candidates are appended
//! to the working context so later epochs can build on earlier drafts.

use moonscrape_shared::{MoonscrapeError, Result};
use tracing::{debug, info, warn};

use crate::llm::LlmClient;

/// Per-epoch focus directive and the keyword its score rewards.
pub const EPOCH_FOCI: [(&str, &str); 5] = [
    ("Extract and structure core facts and relationships", "facts"),
    (
        "Identify and connect supporting evidence and sources",
        "evidence",
    ),
    ("Analyze patterns and trends in the information", "patterns"),
    ("Synthesize insights and draw conclusions", "insights"),
    ("Formulate actionable recommendations", "recommendations"),
];

/// Section headers every summary is asked to produce.
pub const REQUIRED_SECTIONS: [&str; 5] = [
    "### Executive Summary",
    "### Key Findings",
    "### Detailed Analysis",
    "### Recommendations",
    "### Sources",
];

const PREVIOUS_SUMMARY_HEADER: &str = "### Previous Summary";

/// Refinement loop settings.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Number of epochs to run, at most the size of the focus table.
    pub epochs: u32,
    /// Rebuild the working context once it grows past this many characters.
    pub max_context_chars: usize,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            epochs: EPOCH_FOCI.len() as u32,
            max_context_chars: 120_000,
        }
    }
}

/// The best summary a refinement run produced.
#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub score: f64,
    /// Epoch that produced this candidate (1-based).
    pub epoch: u32,
}

/// Run the refinement loop and return the best-scoring summary.
///
/// A failed epoch is skipped and earlier candidates are kept; if every
/// epoch fails the result is `Ok(None)`. A candidate scoring exactly 1.0
/// stops the loop early. `on_epoch` is invoked with each successful
/// epoch's score.
pub async fn refine(
    llm: &LlmClient,
    corpus: &str,
    intent: &str,
    config: &RefineConfig,
    mut on_epoch: impl FnMut(u32, f64),
) -> Result<Option<Summary>> {
    if config.epochs == 0 || config.epochs as usize > EPOCH_FOCI.len() {
        return Err(MoonscrapeError::config(format!(
            "epochs must be between 1 and {}, got {}",
            EPOCH_FOCI.len(),
            config.epochs
        )));
    }

    let mut context = corpus.to_string();
    let mut best: Option<Summary> = None;

    for epoch in 1..=config.epochs {
        let (directive, _) = EPOCH_FOCI[(epoch - 1) as usize];
        let prompt = build_summary_prompt(&context, directive, intent);
        let temperature = 0.3 + 0.05 * f64::from(epoch);

        let candidate = match llm.complete(&prompt, temperature, llm.max_tokens()).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(epoch, error = %e, "epoch failed, keeping earlier candidates");
                continue;
            }
        };

        let candidate_score = score(&candidate, epoch);
        info!(epoch, score = candidate_score, "epoch scored");
        on_epoch(epoch, candidate_score);

        if best.as_ref().is_none_or(|b| candidate_score > b.score) {
            debug!(epoch, "new best summary");
            best = Some(Summary {
                text: candidate.clone(),
                score: candidate_score,
                epoch,
            });
        }

        if candidate_score == 1.0 {
            info!(epoch, "perfect score, stopping early");
            break;
        }

        grow_context(
            &mut context,
            corpus,
            best.as_ref(),
            &candidate,
            config.max_context_chars,
        );
    }

    Ok(best)
}

/// Append a candidate to the working context, rebuilding from the corpus
/// and the best candidate once the cap is exceeded.
fn grow_context(
    context: &mut String,
    corpus: &str,
    best: Option<&Summary>,
    candidate: &str,
    max_chars: usize,
) {
    context.push_str("\n\n");
    context.push_str(PREVIOUS_SUMMARY_HEADER);
    context.push('\n');
    context.push_str(candidate);

    if context.len() > max_chars {
        let rebuilt = match best {
            Some(b) => format!("{corpus}\n\n{PREVIOUS_SUMMARY_HEADER}\n{}", b.text),
            None => corpus.to_string(),
        };
        debug!(
            from = context.len(),
            to = rebuilt.len(),
            "context cap reached, rebuilding"
        );
        *context = rebuilt;
    }
}

/// Deterministic quality score in `[0, 1]`.
///
/// Rewards the required section headers (weight grows with the epoch),
/// the epoch's focus keyword, and length up to a cap. Out-of-range
/// epochs clamp to the nearest entry of the focus table.
pub fn score(text: &str, epoch: u32) -> f64 {
    let mut score = 0.0;

    if !text.is_empty() {
        score += 0.2;
    }

    for section in REQUIRED_SECTIONS {
        if text.contains(section) {
            score += 0.1 + 0.02 * f64::from(epoch);
        }
    }

    let keyword = EPOCH_FOCI[(epoch as usize).saturating_sub(1).min(EPOCH_FOCI.len() - 1)].1;
    if text.to_lowercase().contains(keyword) {
        score += 0.1;
    }

    score += (text.len() as f64 / (2000.0 + 200.0 * f64::from(epoch))).min(0.2);

    score.min(1.0)
}

fn build_summary_prompt(context: &str, directive: &str, intent: &str) -> String {
    format!(
        "Create a comprehensive summary based on this filtered content:\n\
         {context}\n\
         \n\
         Epoch Focus: {directive}\n\
         \n\
         Build upon previous iterations to improve the summary.\n\
         For this epoch, specifically focus on:\n\
         - {directive}\n\
         - Clear structure and organization\n\
         - Depth of analysis\n\
         - Accuracy of information\n\
         - Relevance to user intent: {intent}\n\
         \n\
         Format as:\n\
         ### Executive Summary\n\
         [High-level overview]\n\
         \n\
         ### Key Findings\n\
         [Main insights]\n\
         \n\
         ### Detailed Analysis\n\
         [In-depth examination]\n\
         \n\
         ### Recommendations\n\
         [Actionable suggestions]\n\
         \n\
         ### Sources\n\
         [Citations and references]"
    )
}
