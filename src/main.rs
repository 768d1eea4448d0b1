mod annotate;
mod classifier;
mod collectors;
mod config;
mod error;
mod fetcher;
mod models;
mod output;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::annotate::RoleTable;
use crate::config::{Command, Config};
use crate::fetcher::{FetchSettings, HttpFetcher, PageFetcher, RetryPolicy};
use crate::models::company::CompanyTarget;
use crate::store::{JobStore, PostedAtPolicy};

fn fetch_settings(config: &Config) -> FetchSettings {
    FetchSettings {
        timeout: config.timeout(),
        user_agent: config.user_agent.clone(),
        accept_language: config.accept_language.clone(),
        host_interval: config.host_interval(),
        retry: RetryPolicy {
            max_retries: config.max_retries,
            base_delay: std::time::Duration::from_millis(config.retry_backoff_ms),
        },
    }
}

/// Cancel `token` on Ctrl-C or when the run deadline passes.
fn spawn_stop_signals(config: &Config, token: &CancellationToken) {
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight companies");
            ctrl_c.cancel();
        }
    });

    if let Some(deadline) = config.deadline() {
        let expired = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!("Run deadline of {}s reached", deadline.as_secs());
            expired.cancel();
        });
    }
}

async fn scrape(config: &Config) -> anyhow::Result<()> {
    let targets = CompanyTarget::load(&config.companies)?;
    tracing::info!(
        "Loaded {} companies from {}",
        targets.len(),
        config.companies.display()
    );

    let roles = match &config.roles_file {
        Some(path) => RoleTable::load(path)?,
        None => RoleTable::default(),
    };
    let posted_at = if config.trust_board_dates {
        PostedAtPolicy::PreferBoard
    } else {
        PostedAtPolicy::IngestionTime
    };

    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        HttpFetcher::new(&fetch_settings(config)).context("building HTTP client")?,
    );

    let cancel = CancellationToken::new();
    spawn_stop_signals(config, &cancel);

    let report = collectors::runner::run(
        targets,
        fetcher,
        JobStore::new(roles, posted_at),
        config.concurrency,
        cancel,
    )
    .await?;

    let mut jobs = report.ranked.jobs;
    let previous = output::load_previous_requirements(&config.output).await;
    let carried = output::carry_over_requirements(&mut jobs, previous);
    if carried > 0 {
        tracing::info!("Carried over requirements for {carried} jobs");
    }

    output::write_jobs(&config.output, &jobs).await?;

    if !report.failures.is_empty() {
        tracing::info!("{} companies contributed nothing:", report.failures.len());
        for (company, reason) in &report.failures {
            tracing::info!("  {company}: {reason}");
        }
    }
    if report.cancelled > 0 {
        tracing::warn!("{} companies were not started", report.cancelled);
    }
    Ok(())
}

async fn detect(config: &Config, url: &str) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&fetch_settings(config)).context("building HTTP client")?;
    let page = fetcher
        .fetch(url)
        .await
        .with_context(|| format!("fetching {url}"))?;
    let detection = classifier::classify(&page.final_url, &page.body);
    tracing::info!("{url} -> {} (landed on {})", detection.backend, page.final_url);
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("careerscan=info")),
        )
        .init();

    let config = Config::parse();

    match config.resolved_command() {
        Command::Scrape => scrape(&config).await,
        Command::Detect { url } => detect(&config, &url).await,
    }
}
