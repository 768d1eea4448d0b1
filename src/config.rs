use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Parser, Debug, Clone)]
#[command(name = "careerscan", about = "Aggregate job postings from company career pages")]
pub struct Config {
    /// Company registry JSON (array, or object keyed by index)
    #[arg(long, env = "COMPANIES_FILE", default_value = "companies.json")]
    pub companies: PathBuf,

    /// Where the ranked job list is written
    #[arg(long, env = "OUTPUT_FILE", default_value = "jobs.json")]
    pub output: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "15")]
    pub timeout_secs: u64,

    #[arg(long, env = "SCRAPER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, env = "SCRAPER_ACCEPT_LANGUAGE", default_value = "en-US,en;q=0.9")]
    pub accept_language: String,

    /// Ordered role keyword table; built-in table when absent
    #[arg(long, env = "ROLES_FILE")]
    pub roles_file: Option<PathBuf>,

    /// Number of companies processed concurrently
    #[arg(long, env = "SCRAPE_CONCURRENCY", default_value = "4")]
    pub concurrency: usize,

    /// Minimum milliseconds between two requests to the same host
    #[arg(long, env = "HOST_INTERVAL_MS", default_value = "1000")]
    pub host_interval_ms: u64,

    /// Retries for timed-out fetches (other failures are never retried)
    #[arg(long, env = "FETCH_MAX_RETRIES", default_value = "2")]
    pub max_retries: u32,

    #[arg(long, env = "FETCH_RETRY_BACKOFF_MS", default_value = "500")]
    pub retry_backoff_ms: u64,

    /// Stop starting new companies after this many seconds
    #[arg(long, env = "RUN_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Use dates reported by the board instead of ingestion time
    #[arg(long, env = "TRUST_BOARD_DATES", default_value = "false")]
    pub trust_board_dates: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Scrape every company in the registry (default when no subcommand given)
    Scrape,
    /// Fetch one career page and print which ATS serves it
    Detect {
        #[arg(long)]
        url: String,
    },
}

impl Config {
    /// Resolve the command, defaulting to Scrape if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Scrape)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn host_interval(&self) -> Duration {
        Duration::from_millis(self.host_interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
