//! Shared types, error model, and configuration for MoonScrape.
//!
//! This crate is the foundation depended on by all other MoonScrape crates.
//! It provides:
//! - [`MoonscrapeError`] — the unified error type
//! - Domain types ([`RawDocument`], [`Block`], [`NormalizedDocument`])
//! - Configuration ([`AppConfig`], [`GenerationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DataForSeoConfig, DefaultsConfig, FetchConfig, GenerationConfig, OpenRouterConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_generation,
    resolve_serp_credentials, validate_credentials,
};
pub use error::{MoonscrapeError, Result};
pub use types::{Block, NormalizedDocument, RawDocument};
