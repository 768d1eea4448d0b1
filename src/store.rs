// Normalisation and deduplication of raw postings.
// The store is owned by a single aggregator task; workers hand it batches
// over a channel, so the apply-link map never needs a lock.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::annotate::{self, RoleTable};
use crate::models::detection::AtsBackend;
use crate::models::job::{JobRecord, RawPosting, UNKNOWN_LOCATION};

/// Hex characters of the link digest used when a link has no numeric id.
const HASH_FRAGMENT_LEN: usize = 12;

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/=](\d+)(?:$|[-/?&#_.])").unwrap());
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

/// Which timestamp becomes `postedAt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostedAtPolicy {
    /// Always the moment the posting was ingested.
    #[default]
    IngestionTime,
    /// The board's own date when the strategy recovered one.
    PreferBoard,
}

/// Where a batch of postings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestContext {
    pub company: String,
    pub backend: AtsBackend,
}

impl IngestContext {
    pub fn new(company: impl Into<String>, backend: AtsBackend) -> Self {
        Self {
            company: company.into(),
            backend,
        }
    }

    /// Source label, e.g. `Acme (Greenhouse)`.
    pub fn source(&self) -> String {
        format!("{} ({})", self.company, self.backend)
    }
}

/// Stable id fragment for an apply link: the last numeric path id when
/// there is one (and the link is not UUID-keyed), otherwise the first
/// twelve hex digits of the SHA-256 of the link.
pub fn link_fragment(apply_link: &str) -> String {
    if !UUID.is_match(apply_link)
        && let Some(id) = NUMERIC_ID
            .captures_iter(apply_link)
            .filter_map(|c| c.get(1))
            .last()
    {
        return id.as_str().to_string();
    }
    let digest = hex::encode(Sha256::digest(apply_link.as_bytes()));
    digest[..HASH_FRAGMENT_LEN].to_string()
}

fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Deterministic record id from backend, company and apply link.
pub fn job_id(backend: AtsBackend, company: &str, apply_link: &str) -> String {
    format!(
        "{}-{}-{}",
        backend.as_str().to_lowercase(),
        slugify(company),
        link_fragment(apply_link)
    )
}

pub struct JobStore {
    jobs: Vec<JobRecord>,
    seen: HashSet<String>,
    stats: BTreeMap<String, usize>,
    roles: RoleTable,
    posted_at: PostedAtPolicy,
}

/// Final product of a run's store.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedJobs {
    /// Sorted by score, descending; ties keep discovery order.
    pub jobs: Vec<JobRecord>,
    /// Postings accepted per source label.
    pub stats: BTreeMap<String, usize>,
}

impl JobStore {
    pub fn new(roles: RoleTable, posted_at: PostedAtPolicy) -> Self {
        Self {
            jobs: Vec::new(),
            seen: HashSet::new(),
            stats: BTreeMap::new(),
            roles,
            posted_at,
        }
    }

    /// Normalise and record one posting. Empty or already-seen apply links
    /// are skipped. Returns whether the posting was recorded.
    pub fn add(&mut self, raw: RawPosting, ctx: &IngestContext, now: DateTime<Utc>) -> bool {
        let apply_link = raw.href.trim().to_string();
        if apply_link.is_empty() || self.seen.contains(&apply_link) {
            return false;
        }

        let posted_at = match self.posted_at {
            PostedAtPolicy::IngestionTime => now,
            PostedAtPolicy::PreferBoard => raw.posted_at.unwrap_or(now),
        };
        let title = raw.title.trim().to_string();
        let role = self.roles.infer_role(&title);
        let source = ctx.source();

        let mut job = JobRecord {
            id: job_id(ctx.backend, &ctx.company, &apply_link),
            title,
            company: ctx.company.clone(),
            location: raw
                .raw_location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            source: source.clone(),
            apply_link: apply_link.clone(),
            posted_at,
            role,
            score: 0,
            requirements: None,
        };
        job.score = annotate::score(&job, now);
        tracing::debug!(
            "Accepted {} as {} (score {})",
            job.apply_link,
            job.role,
            job.score
        );

        // Nothing below can fail, so the record, the seen set and the
        // stats always move together.
        self.seen.insert(apply_link);
        *self.stats.entry(source).or_insert(0) += 1;
        self.jobs.push(job);
        true
    }

    /// Add a batch, returning how many postings were new.
    pub fn add_all(
        &mut self,
        postings: Vec<RawPosting>,
        ctx: &IngestContext,
        now: DateTime<Utc>,
    ) -> usize {
        postings
            .into_iter()
            .map(|raw| self.add(raw, ctx, now))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn into_ranked(self) -> RankedJobs {
        let mut jobs = self.jobs;
        jobs.sort_by(|a, b| b.score.cmp(&a.score));
        RankedJobs {
            jobs,
            stats: self.stats,
        }
    }
}

/// One company's extraction output, sent to the aggregator.
#[derive(Debug)]
pub struct Batch {
    pub ctx: IngestContext,
    pub postings: Vec<RawPosting>,
}

/// Handle to the single-writer aggregation task.
pub struct Aggregator {
    tx: mpsc::Sender<Batch>,
    handle: JoinHandle<JobStore>,
}

impl Aggregator {
    pub fn spawn(mut store: JobStore, buffer: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Batch>(buffer.max(1));
        let handle = tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                let found = batch.postings.len();
                let added = store.add_all(batch.postings, &batch.ctx, Utc::now());
                tracing::info!("{}: {found} found, {added} new", batch.ctx.source());
            }
            store
        });
        Self { tx, handle }
    }

    pub fn sender(&self) -> mpsc::Sender<Batch> {
        self.tx.clone()
    }

    /// Close the channel and wait for every queued batch to be applied.
    pub async fn finish(self) -> Result<JobStore, tokio::task::JoinError> {
        drop(self.tx);
        self.handle.await
    }
}
