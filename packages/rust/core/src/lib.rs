//! Research pipeline orchestration.
//!
//! Wires search, fetching, normalization, LLM relevance filtering, and
//! epoch-based summary refinement into a single [`pipeline::run_search`]
//! entry point.

pub mod analyze;
pub mod llm;
pub mod pipeline;
pub mod refine;
pub mod relevance;

pub use llm::LlmClient;
pub use pipeline::{ProgressReporter, SearchConfig, SearchOutcome, SilentProgress, run_search};
pub use refine::{RefineConfig, Summary};
pub use relevance::{NO_RELEVANT_CONTENT, RelevanceOutcome};
