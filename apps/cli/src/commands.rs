//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use moonscrape_core::pipeline::{ProgressReporter, SearchConfig, SearchOutcome};
use moonscrape_core::refine::RefineConfig;
use moonscrape_shared::{
    AppConfig, config_dir, init_config, load_config, resolve_generation, resolve_serp_credentials,
    validate_credentials,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MoonScrape — keyword research pipeline.
#[derive(Parser)]
#[command(
    name = "moonscrape",
    version,
    about = "Search a keyword, distill the result pages, and refine an LLM research summary.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the research pipeline for a keyword.
    Search {
        /// Keyword to research.
        keyword: String,

        /// Maximum number of result URLs to process.
        #[arg(short, long)]
        max_results: Option<usize>,

        /// Refinement epochs to run (1-5).
        #[arg(short, long)]
        epochs: Option<u32>,

        /// Output directory for reports (defaults to the configured one).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// List stored research reports.
    Reports,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "moonscrape=info",
        1 => "moonscrape=debug",
        _ => "moonscrape=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Search {
            keyword,
            max_results,
            epochs,
            out,
        } => cmd_search(&keyword, max_results, epochs, out.as_deref()).await,
        Command::Reports => cmd_reports().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

async fn cmd_search(
    keyword: &str,
    max_results: Option<usize>,
    epochs: Option<u32>,
    out: Option<&str>,
) -> Result<()> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(eyre!("keyword must not be empty"));
    }

    // Validate credentials before any network work
    let config = load_config()?;
    validate_credentials(&config)?;

    let (serp_login, serp_password) = resolve_serp_credentials(&config)?;
    let generation = resolve_generation(&config)?;

    let output_dir = match out {
        Some(p) => PathBuf::from(p),
        None => expand_home(&config.defaults.output_dir),
    };

    let search_config = SearchConfig {
        keyword: keyword.to_string(),
        max_results: max_results.unwrap_or(config.defaults.max_results),
        language_code: config.defaults.language_code.clone(),
        location_code: config.defaults.location_code,
        serp_base_url: config.dataforseo.base_url.clone(),
        serp_login,
        serp_password,
        generation,
        fetch: config.fetch.clone(),
        refine: RefineConfig {
            epochs: epochs.unwrap_or(config.defaults.epochs),
            ..RefineConfig::default()
        },
        db_path: db_path()?,
        output_dir,
        allow_local_fetch: false,
    };

    info!(keyword, max_results = search_config.max_results, "starting search");

    let started = Instant::now();
    let reporter = CliProgress::new();
    let outcome = moonscrape_core::run_search(&search_config, &reporter).await?;

    println!();
    println!("  Search complete!");
    println!("  Keyword:   {}", outcome.keyword);
    println!(
        "  Sources:   {} found, {} fetched, {} relevant",
        outcome.sources_found, outcome.sources_stored, outcome.sources_relevant
    );
    match &outcome.summary {
        Some(summary) => {
            println!(
                "  Summary:   score {:.2} (epoch {})",
                summary.score, summary.epoch
            );
        }
        None => println!("  Summary:   none produced"),
    }
    if let Some(path) = &outcome.report_path {
        println!("  Report:    {}", path.display());
    }
    println!("  Time:      {:.1}s", started.elapsed().as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    fn source_fetched(&self, url: &str, stored: bool) {
        let status = if stored { "stored" } else { "skipped" };
        self.spinner.set_message(format!("Fetching {url} ({status})"));
    }

    fn source_filtered(&self, url: &str, relevant: bool) {
        let status = if relevant { "relevant" } else { "not relevant" };
        self.spinner.set_message(format!("Filtering {url} ({status})"));
    }

    fn epoch_scored(&self, epoch: u32, score: f64) {
        self.spinner
            .set_message(format!("Refining (epoch {epoch}, score {score:.2})"));
    }

    fn done(&self, _outcome: &SearchOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// reports / config
// ---------------------------------------------------------------------------

async fn cmd_reports() -> Result<()> {
    let storage = moonscrape_storage::Storage::open(&db_path()?).await?;
    let reports = storage.list_reports().await?;

    if reports.is_empty() {
        println!("No reports yet. Run `moonscrape search <keyword>` first.");
        return Ok(());
    }

    for report in reports {
        println!(
            "{}  {:<30}  score {:.2}",
            report.created_at, report.keyword, report.score
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn db_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("moonscrape.db"))
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
