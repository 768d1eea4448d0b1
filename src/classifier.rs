// ATS detection.
// An ordered rule table is evaluated against three signals in turn: the
// post-redirect URL, a bounded prefix of the body, then the first anchors.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::models::company::CompanyTarget;
use crate::models::detection::{AtsBackend, DetectionResult};

/// Bytes of body inspected by the content tier.
pub const CONTENT_SCAN_LIMIT: usize = 10_000;
/// Anchors inspected by the link tier.
pub const LINK_SCAN_LIMIT: usize = 50;

/// Path segments that sit where a slug would but never are one.
const NON_SLUG_SEGMENTS: &[&str] = &[
    "embed",
    "v0",
    "v1",
    "jobs",
    "careers",
    "posting-api",
    "api",
    "js",
];

pub struct AtsRule {
    pub backend: AtsBackend,
    /// Host pattern, as it appears in a URL or in markup.
    pattern: &'static LazyLock<Regex>,
    slug: fn(&str) -> Option<String>,
}

impl AtsRule {
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn detect(&self, text: &str) -> DetectionResult {
        DetectionResult {
            backend: self.backend,
            slug: (self.slug)(text),
        }
    }
}

static GREENHOUSE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)greenhouse\.io|boards\.greenhouse").unwrap());
static LEVER_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])lever\.co\b|jobs\.lever").unwrap());
static ASHBY_HOST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ashbyhq\.com").unwrap());
static WORKDAY_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)myworkday(?:jobs|site)?\.com|workday\.com").unwrap());
static JOBVITE_HOST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)jobvite\.com").unwrap());
static BAMBOOHR_HOST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)bamboohr\.com").unwrap());

static GREENHOUSE_EMBED_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)greenhouse\.io/embed/job_board(?:/js)?\?(?:[^"'\s<>]*&)?for=([^&"'\s<>#]+)"#)
        .unwrap()
});
static GREENHOUSE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)greenhouse\.io/([^/?&"'\s<>#]+)"#).unwrap());
static LEVER_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)lever\.co/(?:v0/postings/)?([^/?&"'\s<>#]+)"#).unwrap()
});
static ASHBY_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)ashbyhq\.com/(?:posting-api/job-board/)?([^/?&"'\s<>#]+)"#).unwrap()
});
static JOBVITE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)jobvite\.com/([^/?&"'\s<>#]+)"#).unwrap());
static BAMBOOHR_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([a-z0-9][a-z0-9-]*)\.bamboohr\.com").unwrap());

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Rules in priority order. Within one signal the first matching rule wins.
pub static RULES: [AtsRule; 6] = [
    AtsRule {
        backend: AtsBackend::Greenhouse,
        pattern: &GREENHOUSE_HOST,
        slug: greenhouse_slug,
    },
    AtsRule {
        backend: AtsBackend::Lever,
        pattern: &LEVER_HOST,
        slug: lever_slug,
    },
    AtsRule {
        backend: AtsBackend::Ashby,
        pattern: &ASHBY_HOST,
        slug: ashby_slug,
    },
    AtsRule {
        backend: AtsBackend::Workday,
        pattern: &WORKDAY_HOST,
        slug: no_slug,
    },
    AtsRule {
        backend: AtsBackend::Jobvite,
        pattern: &JOBVITE_HOST,
        slug: jobvite_slug,
    },
    AtsRule {
        backend: AtsBackend::BambooHR,
        pattern: &BAMBOOHR_HOST,
        slug: bamboohr_slug,
    },
];

fn capture_slug(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|s| !s.is_empty() && !NON_SLUG_SEGMENTS.contains(&s.to_lowercase().as_str()))
        .map(str::to_string)
}

fn greenhouse_slug(text: &str) -> Option<String> {
    capture_slug(&GREENHOUSE_EMBED_SLUG, text).or_else(|| capture_slug(&GREENHOUSE_SLUG, text))
}

fn lever_slug(text: &str) -> Option<String> {
    capture_slug(&LEVER_SLUG, text)
}

fn ashby_slug(text: &str) -> Option<String> {
    capture_slug(&ASHBY_SLUG, text)
}

fn jobvite_slug(text: &str) -> Option<String> {
    capture_slug(&JOBVITE_SLUG, text)
}

fn bamboohr_slug(text: &str) -> Option<String> {
    BAMBOOHR_SLUG
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .find(|s| s != "www" && s != "api")
}

fn no_slug(_: &str) -> Option<String> {
    None
}

/// First rule matching `text`, in table order.
fn match_rules(text: &str) -> Option<DetectionResult> {
    let mut matching = RULES.iter().filter(|rule| rule.matches(text));
    let first = matching.next()?;
    if let Some(other) = matching.next() {
        tracing::debug!(
            "Ambiguous ATS signal ({} and {}), taking {}",
            first.backend,
            other.backend,
            first.backend
        );
    }
    Some(first.detect(text))
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn bounded_prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn classify_url(final_url: &str) -> Option<DetectionResult> {
    match_rules(final_url)
}

pub fn classify_content(body: &str) -> Option<DetectionResult> {
    match_rules(bounded_prefix(body, CONTENT_SCAN_LIMIT))
}

pub fn classify_links(body: &str) -> Option<DetectionResult> {
    let document = Html::parse_document(body);
    document
        .select(&ANCHORS)
        .take(LINK_SCAN_LIMIT)
        .filter_map(|a| a.value().attr("href"))
        .find_map(match_rules)
}

/// Classify a fetched career page: URL, then content, then links, then
/// Generic.
pub fn classify(final_url: &str, body: &str) -> DetectionResult {
    if let Some(result) = classify_url(final_url) {
        tracing::debug!("Detected {} from URL {final_url}", result.backend);
        return result;
    }
    if let Some(result) = classify_content(body) {
        tracing::debug!("Detected {} from page content", result.backend);
        return result;
    }
    if let Some(result) = classify_links(body) {
        tracing::debug!("Detected {} from page links", result.backend);
        return result;
    }
    DetectionResult::generic()
}

/// Registry knowledge, when present, replaces detection entirely.
pub fn from_registry(target: &CompanyTarget) -> Option<DetectionResult> {
    target.known_ats.map(|backend| DetectionResult {
        backend,
        slug: if backend == AtsBackend::Workday {
            None
        } else {
            target.known_slug.clone()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(backend: AtsBackend, slug: Option<&str>) -> DetectionResult {
        DetectionResult {
            backend,
            slug: slug.map(str::to_string),
        }
    }

    #[test]
    fn url_signal_beats_content_signal() {
        let body = r#"<script src="https://jobs.lever.co/other/embed"></script>"#;
        let result = classify("https://boards.greenhouse.io/acme", body);
        assert_eq!(result, detected(AtsBackend::Greenhouse, Some("acme")));
    }

    #[test]
    fn slug_stops_at_path_query_or_ampersand() {
        assert_eq!(
            classify_url("https://boards.greenhouse.io/acme/jobs/123?gh_src=x"),
            Some(detected(AtsBackend::Greenhouse, Some("acme")))
        );
        assert_eq!(
            classify_url("https://jobs.lever.co/acme?lever-source=site"),
            Some(detected(AtsBackend::Lever, Some("acme")))
        );
        assert_eq!(
            classify_url("https://jobs.ashbyhq.com/acme&x=1"),
            Some(detected(AtsBackend::Ashby, Some("acme")))
        );
    }

    #[test]
    fn host_without_slug_still_classifies() {
        assert_eq!(
            classify_url("https://boards.greenhouse.io/"),
            Some(detected(AtsBackend::Greenhouse, None))
        );
    }

    #[test]
    fn workday_is_classified_without_slug() {
        assert_eq!(
            classify_url("https://acme.wd5.myworkdayjobs.com/en-US/External"),
            Some(detected(AtsBackend::Workday, None))
        );
        assert_eq!(
            classify("https://wd3.myworkdaysite.com/recruiting/acme/External", "<html></html>"),
            detected(AtsBackend::Workday, None)
        );
        assert_eq!(
            classify_url("https://acme.workday.com/careers"),
            Some(detected(AtsBackend::Workday, None))
        );
    }

    #[test]
    fn lever_does_not_match_inside_other_hosts() {
        assert_eq!(classify_url("https://clever.com/careers"), None);
        assert_eq!(classify_url("https://www.lever.com/about"), None);
    }

    #[test]
    fn greenhouse_embed_uses_for_parameter() {
        let body = r#"<script src="https://boards.greenhouse.io/embed/job_board/js?for=acmeco"></script>"#;
        assert_eq!(
            classify("https://acme.com/careers", body),
            detected(AtsBackend::Greenhouse, Some("acmeco"))
        );
    }

    #[test]
    fn api_paths_yield_the_board_slug() {
        assert_eq!(
            classify_url("https://api.lever.co/v0/postings/acme?mode=json"),
            Some(detected(AtsBackend::Lever, Some("acme")))
        );
        assert_eq!(
            classify_url("https://api.ashbyhq.com/posting-api/job-board/acme"),
            Some(detected(AtsBackend::Ashby, Some("acme")))
        );
    }

    #[test]
    fn bamboohr_slug_is_the_subdomain() {
        assert_eq!(
            classify_url("https://acme.bamboohr.com/careers"),
            Some(detected(AtsBackend::BambooHR, Some("acme")))
        );
    }

    #[test]
    fn content_tier_only_reads_a_bounded_prefix() {
        let mut body = "x".repeat(CONTENT_SCAN_LIMIT);
        body.push_str("https://jobs.jobvite.com/acme/jobs");
        assert_eq!(classify_content(&body), None);
        // Not an anchor either, so the page stays generic.
        assert_eq!(classify("https://acme.com/careers", &body), DetectionResult::generic());
    }

    #[test]
    fn link_tier_uses_first_matching_href() {
        let mut body = String::from("<html><body>");
        for i in 0..3 {
            body.push_str(&format!(r#"<a href="/about/{i}">About</a>"#));
        }
        body.push_str(r#"<a href="https://jobs.jobvite.com/acme/jobs">Open roles</a>"#);
        body.push_str(r#"<a href="https://jobs.lever.co/acme">Lever</a>"#);
        body.push_str("</body></html>");
        // Anchors beyond the content limit are still visible to the link tier.
        let padded = format!("<!--{}-->{body}", "x".repeat(CONTENT_SCAN_LIMIT));
        assert_eq!(
            classify("https://acme.com/careers", &padded),
            detected(AtsBackend::Jobvite, Some("acme"))
        );
    }

    #[test]
    fn link_tier_stops_after_limit() {
        let mut body = format!("<!--{}-->", "x".repeat(CONTENT_SCAN_LIMIT));
        for i in 0..LINK_SCAN_LIMIT {
            body.push_str(&format!(r#"<a href="/page/{i}">Page</a>"#));
        }
        body.push_str(r#"<a href="https://boards.greenhouse.io/acme">Jobs</a>"#);
        assert_eq!(classify_links(&body), None);
    }

    #[test]
    fn unknown_page_is_generic() {
        let body = r#"<a href="/jobs/42-engineer">Engineer</a>"#;
        assert_eq!(classify("https://acme.com/careers", body), DetectionResult::generic());
    }

    #[test]
    fn registry_knowledge_takes_precedence() {
        let target = CompanyTarget {
            name: "Acme".into(),
            career_url: "https://boards.greenhouse.io/acme".into(),
            known_ats: Some(AtsBackend::Lever),
            known_slug: Some("acme-inc".into()),
            country: "GLOBAL".into(),
        };
        assert_eq!(
            from_registry(&target),
            Some(detected(AtsBackend::Lever, Some("acme-inc")))
        );
    }

    #[test]
    fn bounded_prefix_respects_char_boundaries() {
        let s = "aé";
        assert_eq!(bounded_prefix(s, 2), "a");
        assert_eq!(bounded_prefix(s, 3), "aé");
    }
}
