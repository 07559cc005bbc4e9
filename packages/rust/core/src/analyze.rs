//! Final SEO analysis pass over the best summary.

use std::path::{Path, PathBuf};

use moonscrape_shared::{MoonscrapeError, Result};
use tracing::info;

use crate::llm::LlmClient;

const ANALYZE_MAX_TOKENS: u32 = 3000;

/// Filename of the aggregated report inside the analysis directory.
pub const REPORT_FILENAME: &str = "aggregated_analysis.txt";

/// Run a single SEO analysis call over the refined summary.
pub async fn analyze_summary(llm: &LlmClient, summary: &str) -> Result<String> {
    let prompt = format!(
        "Perform a comprehensive SEO analysis of this content:\n\
         {summary}\n\
         \n\
         Include:\n\
         1. Key SEO opportunities\n\
         2. Content structure improvements\n\
         3. Keyword optimization suggestions\n\
         4. Engagement strategies\n\
         5. Technical SEO considerations\n\
         6. Content gap analysis\n\
         7. Backlink opportunities"
    );

    llm.complete(&prompt, llm.temperature(), ANALYZE_MAX_TOKENS)
        .await
}

/// Write the analysis report under `<output_dir>/analysis/`.
pub fn write_report(output_dir: &Path, report: &str) -> Result<PathBuf> {
    let analysis_dir = output_dir.join("analysis");
    std::fs::create_dir_all(&analysis_dir).map_err(|e| MoonscrapeError::io(&analysis_dir, e))?;

    let report_path = analysis_dir.join(REPORT_FILENAME);
    std::fs::write(&report_path, report).map_err(|e| MoonscrapeError::io(&report_path, e))?;

    info!(path = %report_path.display(), "analysis report written");
    Ok(report_path)
}
