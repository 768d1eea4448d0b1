use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::collectors::JobCollector;
use crate::collectors::html::{
    element_text, is_acceptable_title, nearby_location, resolve_against, title_without_location,
};
use crate::error::ScrapeError;
use crate::fetcher::PageFetcher;
use crate::models::detection::AtsBackend;
use crate::models::job::RawPosting;

static NUMERIC_JOB_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/jobs/\d+").unwrap());
static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}(?:$|[/?#])")
        .unwrap()
});
static JOBVITE_JOB_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/job/[A-Za-z0-9]{4,}").unwrap());
static BAMBOOHR_JOB_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/careers/\d+").unwrap());

/// How one backend renders its server-side job board.
pub struct BoardProfile {
    pub backend: AtsBackend,
    board_url: fn(&str) -> String,
    /// Tried in order; the first one producing accepted postings is used
    /// on its own.
    pub selectors: &'static [&'static str],
    /// Element inside the anchor holding just the title, for boards that
    /// pack title and metadata into one link.
    title_selector: Option<&'static str>,
    job_link: &'static LazyLock<Regex>,
}

impl BoardProfile {
    pub fn board_url(&self, slug: &str) -> String {
        (self.board_url)(slug)
    }

    pub fn is_job_link(&self, href: &str) -> bool {
        self.job_link.is_match(href)
    }
}

pub static GREENHOUSE: BoardProfile = BoardProfile {
    backend: AtsBackend::Greenhouse,
    board_url: |slug| format!("https://boards.greenhouse.io/{slug}"),
    selectors: &[
        "div.opening > a",
        "tr.job-post a",
        "a[data-mapped='true']",
        "a[href*='/jobs/']",
    ],
    title_selector: None,
    job_link: &NUMERIC_JOB_PATH,
};

pub static LEVER: BoardProfile = BoardProfile {
    backend: AtsBackend::Lever,
    board_url: |slug| format!("https://jobs.lever.co/{slug}"),
    selectors: &["a.posting-title", "div.posting a[href]", "a[href*='lever.co/']"],
    title_selector: Some("[data-qa='posting-name'], h5"),
    job_link: &UUID_SEGMENT,
};

pub static ASHBY: BoardProfile = BoardProfile {
    backend: AtsBackend::Ashby,
    board_url: |slug| format!("https://jobs.ashbyhq.com/{slug}"),
    selectors: &["a[class*='job-posting']", "a[href*='ashbyhq.com/']", "a[href]"],
    title_selector: Some("h3"),
    job_link: &UUID_SEGMENT,
};

pub static JOBVITE: BoardProfile = BoardProfile {
    backend: AtsBackend::Jobvite,
    board_url: |slug| format!("https://jobs.jobvite.com/{slug}/jobs"),
    selectors: &["td.jv-job-list-name a", "li.jv-job-list-item a", "a[href*='/job/']"],
    title_selector: None,
    job_link: &JOBVITE_JOB_PATH,
};

pub static BAMBOOHR: BoardProfile = BoardProfile {
    backend: AtsBackend::BambooHR,
    board_url: |slug| format!("https://{slug}.bamboohr.com/careers"),
    selectors: &[
        "li.ResAts__listing a",
        "a.ResAts__listing-link",
        "a[href*='/careers/']",
    ],
    title_selector: None,
    job_link: &BAMBOOHR_JOB_PATH,
};

pub fn profile_for(backend: AtsBackend) -> Option<&'static BoardProfile> {
    match backend {
        AtsBackend::Greenhouse => Some(&GREENHOUSE),
        AtsBackend::Lever => Some(&LEVER),
        AtsBackend::Ashby => Some(&ASHBY),
        AtsBackend::Jobvite => Some(&JOBVITE),
        AtsBackend::BambooHR => Some(&BAMBOOHR),
        AtsBackend::Workday | AtsBackend::Generic => None,
    }
}

fn anchor_title(anchor: ElementRef<'_>, title_selector: Option<&str>, location: Option<&str>) -> String {
    let inner = title_selector
        .and_then(|s| Selector::parse(s).ok())
        .and_then(|s| anchor.select(&s).next().map(element_text))
        .filter(|t| !t.is_empty());
    match inner {
        Some(title) => title,
        None => title_without_location(&element_text(anchor), location),
    }
}

fn accept_anchor(anchor: ElementRef<'_>, base_url: &str, profile: &BoardProfile) -> Option<RawPosting> {
    let href = anchor.value().attr("href")?;
    if !profile.is_job_link(href) {
        return None;
    }
    let location = nearby_location(anchor);
    let title = anchor_title(anchor, profile.title_selector, location.as_deref());
    if !is_acceptable_title(&title) {
        return None;
    }
    let link = resolve_against(base_url, href)?;
    Some(RawPosting::new(title, link).with_location(location))
}

/// Extract postings from a rendered board page. The first selector that
/// matches any anchor is chosen and only its anchors are filtered; later
/// selectors are not consulted even when every match is rejected.
pub fn parse_board(html: &str, base_url: &str, profile: &BoardProfile) -> Vec<RawPosting> {
    let document = Html::parse_document(html);

    for (index, pattern) in profile.selectors.iter().enumerate() {
        let Ok(selector) = Selector::parse(pattern) else {
            tracing::warn!("Skipping unparsable selector {pattern}");
            continue;
        };
        if document.select(&selector).next().is_none() {
            continue;
        }

        let mut seen = HashSet::new();
        let postings: Vec<RawPosting> = document
            .select(&selector)
            .filter_map(|a| accept_anchor(a, base_url, profile))
            .filter(|p| seen.insert(p.href.clone()))
            .collect();

        tracing::debug!(
            "{} board: selector #{index} ({pattern}) chosen, {} postings accepted",
            profile.backend,
            postings.len()
        );
        return postings;
    }

    Vec::new()
}

/// Board-hosted HTML strategy for one backend.
pub struct BoardCollector {
    profile: &'static BoardProfile,
}

impl BoardCollector {
    pub fn new(profile: &'static BoardProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl JobCollector for BoardCollector {
    fn name(&self) -> &str {
        "board"
    }

    fn backend(&self) -> AtsBackend {
        self.profile.backend
    }

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        slug: &str,
    ) -> Result<Vec<RawPosting>, ScrapeError> {
        let url = self.profile.board_url(slug);
        let page = fetcher.fetch(&url).await?;
        Ok(parse_board(&page.body, &page.final_url, self.profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;

    const BASE: &str = "https://boards.greenhouse.io/acme";

    #[test]
    fn uses_first_selector_with_results_only() {
        // Only the third Greenhouse selector matches; the fourth would also
        // match the extra link but must not be unioned in.
        let html = r#"
            <div>
              <a data-mapped="true" href="/acme/jobs/101">Backend Engineer</a>
              <a data-mapped="true" href="/acme/jobs/102">Product Designer</a>
              <a href="/acme/jobs/103">Should Not Appear</a>
            </div>"#;
        let postings = parse_board(html, BASE, &GREENHOUSE);
        let titles: Vec<_> = postings.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Backend Engineer", "Product Designer"]);
        assert_eq!(postings[0].href, "https://boards.greenhouse.io/acme/jobs/101");
    }

    #[test]
    fn chosen_selector_is_kept_even_when_all_its_matches_are_rejected() {
        // `div.opening > a` matches first, so the looser `/jobs/` selector
        // is never consulted.
        let html = r#"
            <div class="opening"><a href="/acme/departments">All Departments</a></div>
            <a href="/acme/jobs/7">Site Reliability Engineer</a>"#;
        assert!(parse_board(html, BASE, &GREENHOUSE).is_empty());
    }

    #[test]
    fn selectors_without_matches_are_skipped() {
        let html = r#"<a href="/acme/jobs/7">Site Reliability Engineer</a>"#;
        let postings = parse_board(html, BASE, &GREENHOUSE);
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].title, "Site Reliability Engineer");
    }

    #[test]
    fn rejects_non_job_links_short_and_nav_titles() {
        let html = r#"
            <div class="opening"><a href="/acme/jobs/1">QA</a></div>
            <div class="opening"><a href="/acme/jobs/2">View all jobs</a></div>
            <div class="opening"><a href="/acme/about">About Acme Inc</a></div>
            <div class="opening"><a href="/acme/jobs/3">Data Analyst</a><span class="location">Remote</span></div>"#;
        let postings = parse_board(html, BASE, &GREENHOUSE);
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].title, "Data Analyst");
        assert_eq!(postings[0].raw_location.as_deref(), Some("Remote"));
    }

    #[test]
    fn missing_location_stays_empty() {
        let html = r#"<div class="opening"><a href="/acme/jobs/9">Account Executive</a></div>"#;
        let postings = parse_board(html, BASE, &GREENHOUSE);
        assert_eq!(postings[0].raw_location, None);
    }

    #[test]
    fn lever_board_reads_title_element_and_uuid_links() {
        let html = r#"
            <div class="posting">
              <a class="posting-title" href="https://jobs.lever.co/acme/0c3e1a9e-1b2c-4d5e-8f90-a1b2c3d4e5f6">
                <h5 data-qa="posting-name">Staff Engineer</h5>
                <div class="posting-categories"><span class="sort-by-location posting-category location">Toronto</span></div>
              </a>
            </div>
            <a class="posting-title" href="https://jobs.lever.co/acme/">Acme jobs home</a>"#;
        let postings = parse_board(html, "https://jobs.lever.co/acme", &LEVER);
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].title, "Staff Engineer");
        assert_eq!(postings[0].raw_location.as_deref(), Some("Toronto"));
    }

    #[test]
    fn malformed_or_empty_page_yields_nothing() {
        assert!(parse_board("", BASE, &GREENHOUSE).is_empty());
        assert!(parse_board("<div><a href=", BASE, &GREENHOUSE).is_empty());
    }

    #[tokio::test]
    async fn collector_fetches_the_board_url() {
        let fetcher = StubFetcher::new().with_page(
            "https://acme.bamboohr.com/careers",
            r#"<ul><li class="ResAts__listing"><a href="/careers/42">Support Specialist</a></li></ul>"#,
        );
        let collector = BoardCollector::new(&BAMBOOHR);
        let postings = collector.collect(&fetcher, "acme").await.unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].href, "https://acme.bamboohr.com/careers/42");
    }

    #[tokio::test]
    async fn collector_surfaces_fetch_errors() {
        let fetcher = StubFetcher::new();
        let collector = BoardCollector::new(&JOBVITE);
        let err = collector.collect(&fetcher, "acme").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch(_)));
    }
}
