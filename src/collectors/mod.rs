// Extraction strategies.
// One collector per known ATS backend (board HTML or JSON API), plus the
// generic heuristic extractor for everything else.

pub mod api;
pub mod board;
pub mod generic;
pub mod html;
pub mod runner;

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::fetcher::PageFetcher;
use crate::models::detection::AtsBackend;
use crate::models::job::RawPosting;

/// Trait that all ATS collectors must implement.
/// A collector reads one company's board, identified by its slug, and
/// returns the postings it found.
#[async_trait]
pub trait JobCollector: Send + Sync {
    /// Short label for logs ("board", "api").
    fn name(&self) -> &str;

    fn backend(&self) -> AtsBackend;

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        slug: &str,
    ) -> Result<Vec<RawPosting>, ScrapeError>;
}

/// Collector for a backend: the JSON API where the backend has one, board
/// HTML otherwise. Workday and Generic have none.
pub fn get_collector(backend: AtsBackend) -> Option<Box<dyn JobCollector>> {
    if let Some(profile) = api::profile_for(backend) {
        return Some(Box::new(api::ApiCollector::new(profile)));
    }
    board::profile_for(backend).map(|profile| {
        Box::new(board::BoardCollector::new(profile)) as Box<dyn JobCollector>
    })
}

/// Strategy boundary: a failing or malformed board yields no postings.
pub async fn collect_or_empty(
    collector: &dyn JobCollector,
    fetcher: &dyn PageFetcher,
    company: &str,
    slug: &str,
) -> Vec<RawPosting> {
    match collector.collect(fetcher, slug).await {
        Ok(postings) => postings,
        Err(e) => {
            tracing::warn!(
                "{company}: {} {} collector failed for '{slug}': {e}",
                collector.backend(),
                collector.name()
            );
            Vec::new()
        }
    }
}
