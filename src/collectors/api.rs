use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::collectors::JobCollector;
use crate::collectors::board::{self, BoardProfile};
use crate::collectors::html::{clean_text, is_acceptable_title};
use crate::error::ScrapeError;
use crate::fetcher::PageFetcher;
use crate::models::detection::AtsBackend;
use crate::models::job::RawPosting;

/// A backend's JSON postings endpoint.
pub struct ApiProfile {
    pub backend: AtsBackend,
    endpoint: fn(&str) -> String,
    /// JSON pointer to the postings array; empty for a root array.
    postings_pointer: &'static str,
    parse_entry: fn(&Value) -> Option<RawPosting>,
    /// Board used when the API is unavailable for a tenant.
    fallback: &'static BoardProfile,
}

impl ApiProfile {
    pub fn endpoint(&self, slug: &str) -> String {
        (self.endpoint)(slug)
    }
}

pub static LEVER_API: ApiProfile = ApiProfile {
    backend: AtsBackend::Lever,
    endpoint: |slug| format!("https://api.lever.co/v0/postings/{slug}?mode=json"),
    postings_pointer: "",
    parse_entry: parse_lever_entry,
    fallback: &board::LEVER,
};

pub static ASHBY_API: ApiProfile = ApiProfile {
    backend: AtsBackend::Ashby,
    endpoint: |slug| format!("https://api.ashbyhq.com/posting-api/job-board/{slug}"),
    postings_pointer: "/jobs",
    parse_entry: parse_ashby_entry,
    fallback: &board::ASHBY,
};

pub fn profile_for(backend: AtsBackend) -> Option<&'static ApiProfile> {
    match backend {
        AtsBackend::Lever => Some(&LEVER_API),
        AtsBackend::Ashby => Some(&ASHBY_API),
        _ => None,
    }
}

fn str_field<'a>(entry: &'a Value, pointer: &str) -> Option<&'a str> {
    entry
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn posting_from(title: &str, href: &str) -> Option<RawPosting> {
    let title = clean_text(title);
    if !is_acceptable_title(&title) {
        return None;
    }
    Some(RawPosting::new(title, href))
}

fn parse_lever_entry(entry: &Value) -> Option<RawPosting> {
    let title = str_field(entry, "/text")?;
    let href = str_field(entry, "/hostedUrl").or_else(|| str_field(entry, "/applyUrl"))?;
    let location = str_field(entry, "/categories/location").map(String::from);
    let posted_at = entry
        .get("createdAt")
        .and_then(|v| v.as_i64())
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    Some(
        posting_from(title, href)?
            .with_location(location)
            .with_posted_at(posted_at),
    )
}

fn parse_ashby_entry(entry: &Value) -> Option<RawPosting> {
    if entry.get("isListed").and_then(|v| v.as_bool()) == Some(false) {
        return None;
    }
    let title = str_field(entry, "/title")?;
    let href = str_field(entry, "/jobUrl").or_else(|| str_field(entry, "/applyUrl"))?;
    let location = str_field(entry, "/location").map(String::from);
    let posted_at = str_field(entry, "/publishedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));
    Some(
        posting_from(title, href)?
            .with_location(location)
            .with_posted_at(posted_at),
    )
}

/// Parse an API response body. `Err` means the body is not the expected
/// JSON array, which sends the collector to the board fallback.
pub fn parse_postings(body: &str, profile: &ApiProfile) -> Result<Vec<RawPosting>, ScrapeError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| ScrapeError::Parse(format!("{} API: {e}", profile.backend)))?;
    let entries = data
        .pointer(profile.postings_pointer)
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            ScrapeError::Parse(format!("{} API: postings array missing", profile.backend))
        })?;
    Ok(entries.iter().filter_map(profile.parse_entry).collect())
}

/// JSON API first, board HTML when the API is disabled or malformed.
pub struct ApiCollector {
    profile: &'static ApiProfile,
}

impl ApiCollector {
    pub fn new(profile: &'static ApiProfile) -> Self {
        Self { profile }
    }

    async fn collect_api(
        &self,
        fetcher: &dyn PageFetcher,
        slug: &str,
    ) -> Result<Vec<RawPosting>, ScrapeError> {
        let page = fetcher.fetch(&self.profile.endpoint(slug)).await?;
        if page.status != 200 {
            return Err(ScrapeError::Parse(format!(
                "{} API answered {}",
                self.profile.backend, page.status
            )));
        }
        parse_postings(&page.body, self.profile)
    }
}

#[async_trait]
impl JobCollector for ApiCollector {
    fn name(&self) -> &str {
        "api"
    }

    fn backend(&self) -> AtsBackend {
        self.profile.backend
    }

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        slug: &str,
    ) -> Result<Vec<RawPosting>, ScrapeError> {
        match self.collect_api(fetcher, slug).await {
            Ok(postings) => Ok(postings),
            Err(e) => {
                tracing::info!(
                    "{} API unavailable for '{slug}' ({e}), falling back to board",
                    self.profile.backend
                );
                board::BoardCollector::new(self.profile.fallback)
                    .collect(fetcher, slug)
                    .await
            }
        }
    }
}
