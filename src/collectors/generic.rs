// Heuristic extraction for career pages with no recognised ATS.
// Unlike the board strategy every selector contributes; the union is
// deduplicated by link and then filtered.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::collectors::html::{
    element_text, is_acceptable_title, nearby_location, resolve_career_link,
    title_without_location,
};
use crate::fetcher::FetchedPage;
use crate::models::job::RawPosting;

pub const GENERIC_SELECTORS: &[&str] = &[
    "a[class*='job']",
    "a[class*='position']",
    "a[class*='opening']",
    "a[class*='role']",
    "[class*='job'] a[href]",
    "[class*='position'] a[href]",
    "[class*='opening'] a[href]",
    "[class*='role'] a[href]",
    "a[href*='/jobs/']",
    "a[href*='/job/']",
    "a[href*='/careers/'][href*='job']",
    "a[href*='/positions/']",
    "a[href*='apply']",
];

/// Substrings of a link path that suggest a single posting.
const JOB_LINK_HINTS: &[&str] = &[
    "/job/",
    "/position/",
    "/opening/",
    "/role/",
    "apply",
    "posting",
    "-",
];

/// Listing, landing and company pages that are never a posting.
static NAV_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:/?|/careers/?|/jobs/?|/(?:departments|locations|teams|about|contact)(?:/.*)?)$")
        .unwrap()
});

static SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    GENERIC_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

/// Path and query of an absolute link, the part the heuristics look at.
fn link_path(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    })
}

pub fn is_nav_path(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    NAV_PATH.is_match(path)
}

pub fn looks_like_job_link(path: &str) -> bool {
    let lower = path.to_lowercase();
    JOB_LINK_HINTS.iter().any(|hint| lower.contains(hint))
}

struct Candidate {
    title: String,
    link: String,
    location: Option<String>,
}

/// Extract postings from an already-fetched career page.
pub fn extract(page: &FetchedPage) -> Vec<RawPosting> {
    let document = Html::parse_document(&page.body);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for selector in SELECTORS.iter() {
        for anchor in document.select(selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(link) = resolve_career_link(&page.final_url, href) else {
                continue;
            };
            if !seen.insert(link.clone()) {
                continue;
            }
            let location = nearby_location(anchor);
            let title = title_without_location(&element_text(anchor), location.as_deref());
            candidates.push(Candidate {
                title,
                link,
                location,
            });
        }
    }

    let found = candidates.len();
    let postings: Vec<RawPosting> = candidates
        .into_iter()
        .filter(|c| {
            let Some(path) = link_path(&c.link) else {
                return false;
            };
            !is_nav_path(&path) && is_acceptable_title(&c.title) && looks_like_job_link(&path)
        })
        .map(|c| RawPosting::new(c.title, c.link).with_location(c.location))
        .collect();

    tracing::debug!(
        "Generic extraction on {}: {found} candidates, {} kept",
        page.final_url,
        postings.len()
    );
    postings
}
