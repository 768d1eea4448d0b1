use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::classifier;
use crate::collectors::{self, generic};
use crate::error::CompanyError;
use crate::fetcher::PageFetcher;
use crate::models::company::CompanyTarget;
use crate::models::detection::{AtsBackend, DetectionResult};
use crate::models::job::RawPosting;
use crate::store::{Aggregator, Batch, IngestContext, JobStore, RankedJobs};

/// A company's extraction output.
#[derive(Debug)]
pub struct CompanyScrape {
    pub detection: DetectionResult,
    /// Strategy actually used; Generic when a known backend had no slug.
    pub strategy: AtsBackend,
    pub postings: Vec<RawPosting>,
}

#[derive(Debug)]
enum Outcome {
    Scraped,
    Failed { company: String, reason: String },
    Cancelled,
}

/// End-of-run summary.
#[derive(Debug)]
pub struct RunReport {
    pub ranked: RankedJobs,
    /// Companies that contributed nothing, with the reason.
    pub failures: BTreeMap<String, String>,
    /// Companies never started because the run was cancelled.
    pub cancelled: usize,
}

async fn collect_with(
    backend: AtsBackend,
    slug: &str,
    fetcher: &dyn PageFetcher,
    company: &str,
) -> Option<Vec<RawPosting>> {
    let collector = collectors::get_collector(backend)?;
    Some(collectors::collect_or_empty(&*collector, fetcher, company, slug).await)
}

/// Detect and extract one company. Registry knowledge is used as-is when
/// it names a backend and slug; otherwise the career page is fetched and
/// classified.
pub async fn scrape_company(
    fetcher: &dyn PageFetcher,
    target: &CompanyTarget,
) -> Result<CompanyScrape, CompanyError> {
    let known = classifier::from_registry(target);

    if let Some(detection) = &known
        && detection.backend != AtsBackend::Generic
    {
        if !detection.backend.is_extractable() {
            return Err(CompanyError::Unsupported(detection.backend));
        }
        if let Some(slug) = &detection.slug
            && let Some(postings) =
                collect_with(detection.backend, slug, fetcher, &target.name).await
        {
            return Ok(CompanyScrape {
                detection: detection.clone(),
                strategy: detection.backend,
                postings,
            });
        }
    }

    if target.career_url.is_empty() {
        return Err(CompanyError::MissingUrl);
    }
    let page = fetcher.fetch(&target.career_url).await?;

    let detection = match known {
        Some(known) if known.backend == AtsBackend::Generic => known,
        // Registry names the backend but not the slug: take the slug from
        // the page if it agrees on the backend.
        Some(known) => {
            let inferred = classifier::classify(&page.final_url, &page.body);
            if inferred.backend == known.backend { inferred } else { known }
        }
        None => classifier::classify(&page.final_url, &page.body),
    };

    if !detection.backend.is_extractable() {
        return Err(CompanyError::Unsupported(detection.backend));
    }

    if let Some(slug) = &detection.slug
        && let Some(postings) = collect_with(detection.backend, slug, fetcher, &target.name).await
    {
        return Ok(CompanyScrape {
            strategy: detection.backend,
            detection,
            postings,
        });
    }

    if detection.backend != AtsBackend::Generic {
        tracing::debug!(
            "{}: {} detected without slug, using generic extraction",
            target.name,
            detection.backend
        );
    }
    Ok(CompanyScrape {
        detection,
        strategy: AtsBackend::Generic,
        postings: generic::extract(&page),
    })
}

async fn process_company(
    fetcher: &dyn PageFetcher,
    target: CompanyTarget,
    tx: tokio::sync::mpsc::Sender<Batch>,
    cancel: CancellationToken,
) -> Outcome {
    if cancel.is_cancelled() {
        tracing::info!("{}: skipped, run cancelled", target.name);
        return Outcome::Cancelled;
    }

    match scrape_company(fetcher, &target).await {
        Ok(scrape) => {
            tracing::debug!(
                "{} [{}]: {} via {} strategy, {} postings",
                target.name,
                target.country,
                scrape.detection.backend,
                scrape.strategy,
                scrape.postings.len()
            );
            let batch = Batch {
                ctx: IngestContext::new(target.name.clone(), scrape.strategy),
                postings: scrape.postings,
            };
            if tx.send(batch).await.is_err() {
                return Outcome::Failed {
                    company: target.name,
                    reason: "aggregator stopped".to_string(),
                };
            }
            Outcome::Scraped
        }
        Err(e @ CompanyError::Unsupported(_)) => {
            tracing::info!("{}: {e}", target.name);
            Outcome::Failed {
                company: target.name,
                reason: e.to_string(),
            }
        }
        Err(e) => {
            tracing::warn!("{}: {e}", target.name);
            Outcome::Failed {
                company: target.name,
                reason: e.to_string(),
            }
        }
    }
}

/// Scrape every target with at most `concurrency` companies in flight.
/// Cancellation is honoured between companies; in-flight companies finish.
pub async fn run(
    targets: Vec<CompanyTarget>,
    fetcher: Arc<dyn PageFetcher>,
    store: JobStore,
    concurrency: usize,
    cancel: CancellationToken,
) -> anyhow::Result<RunReport> {
    let concurrency = concurrency.max(1);
    let total = targets.len();
    tracing::info!("Scraping {total} companies, {concurrency} at a time");

    let aggregator = Aggregator::spawn(store, concurrency * 2);

    let outcomes: Vec<Outcome> = stream::iter(targets)
        .map(|target| {
            let fetcher = Arc::clone(&fetcher);
            let tx = aggregator.sender();
            let cancel = cancel.clone();
            async move { process_company(&*fetcher, target, tx, cancel).await }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let store = aggregator.finish().await?;
    if store.is_empty() {
        tracing::warn!("No postings collected from {total} companies");
    } else {
        tracing::debug!("Store holds {} postings", store.len());
    }

    let mut failures = BTreeMap::new();
    let mut cancelled = 0;
    for outcome in outcomes {
        match outcome {
            Outcome::Scraped => {}
            Outcome::Failed { company, reason } => {
                failures.insert(company, reason);
            }
            Outcome::Cancelled => cancelled += 1,
        }
    }

    let ranked = store.into_ranked();
    tracing::info!(
        "Run finished: {} jobs from {} companies, {} failed, {cancelled} cancelled",
        ranked.jobs.len(),
        total - failures.len() - cancelled,
        failures.len()
    );
    for (source, count) in &ranked.stats {
        tracing::info!("  {source}: {count}");
    }

    Ok(RunReport {
        ranked,
        failures,
        cancelled,
    })
}
