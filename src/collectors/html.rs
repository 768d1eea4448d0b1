// Markup helpers shared by the board and generic strategies.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use url::Url;

/// Shortest anchor text accepted as a job title.
pub const MIN_TITLE_LEN: usize = 5;

/// Anchor texts that label navigation rather than a posting.
pub const NAV_KEYWORDS: &[&str] = &[
    "all jobs",
    "all openings",
    "all positions",
    "view all",
    "see all",
    "departments",
    "locations",
    "browse",
    "filter",
    "search jobs",
    "back to",
    "sign in",
    "log in",
    "talent community",
    "privacy",
    "cookie",
];

/// How far up the tree to look for a location label.
const LOCATION_ANCESTOR_DEPTH: usize = 2;

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static LOCATION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[class*='location'], [class*='Location'], [data-qa*='location']").unwrap()
});

/// Collapse all whitespace runs to single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn is_nav_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    NAV_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Non-empty, long enough and not a navigation label.
pub fn is_acceptable_title(title: &str) -> bool {
    title.chars().count() >= MIN_TITLE_LEN && !is_nav_title(title)
}

/// Location label inside the anchor or near it (parent, grandparent).
/// Ancestors holding other job links are not searched, so one row never
/// borrows its neighbour's location.
pub fn nearby_location(anchor: ElementRef<'_>) -> Option<String> {
    let find_in = |scope: ElementRef<'_>| {
        scope
            .select(&LOCATION)
            .map(element_text)
            .find(|text| !text.is_empty())
    };

    if let Some(location) = find_in(anchor) {
        return Some(location);
    }

    let mut current = anchor;
    for _ in 0..LOCATION_ANCESTOR_DEPTH {
        current = match current.parent().and_then(ElementRef::wrap) {
            Some(parent) => parent,
            None => break,
        };
        if current.select(&ANCHORS).nth(1).is_some() {
            break;
        }
        if let Some(location) = find_in(current) {
            return Some(location);
        }
    }
    None
}

/// Anchor text minus a trailing location label, when the board renders
/// both inside the link.
pub fn title_without_location(title: &str, location: Option<&str>) -> String {
    match location {
        Some(location) if title.len() > location.len() => title
            .strip_suffix(location)
            .map(clean_text)
            .unwrap_or_else(|| title.to_string()),
        _ => title.to_string(),
    }
}

fn is_unfollowable(href: &str) -> bool {
    let lower = href.to_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
}

/// Resolve a board link the standard way, against the board URL.
pub fn resolve_against(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if is_unfollowable(href) {
        return None;
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

/// Resolve a link found on a company's own career page.
///
/// Relative links, root-relative ones included, are joined onto the page
/// URL with any trailing `/careers` or `/jobs` removed, since detail pages
/// usually live beside the listing rather than beneath it.
pub fn resolve_career_link(origin: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if is_unfollowable(href) {
        return None;
    }
    let lower = href.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }

    let mut page = Url::parse(origin).ok()?;
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("{}://{rest}", page.scheme()));
    }

    page.set_query(None);
    page.set_fragment(None);
    let base = page.as_str().trim_end_matches('/');
    let base = base
        .strip_suffix("/careers")
        .or_else(|| base.strip_suffix("/jobs"))
        .unwrap_or(base);
    let path = href.strip_prefix('/').unwrap_or(href);
    Some(format!("{base}/{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn career_links_drop_the_careers_suffix() {
        assert_eq!(
            resolve_career_link("https://x.com/careers", "/jobs/42-engineer").as_deref(),
            Some("https://x.com/jobs/42-engineer")
        );
        assert_eq!(
            resolve_career_link("https://x.com/careers/", "jobs/7-designer").as_deref(),
            Some("https://x.com/jobs/7-designer")
        );
        assert_eq!(
            resolve_career_link("https://x.com/about/jobs?team=eng", "apply-now").as_deref(),
            Some("https://x.com/about/apply-now")
        );
    }

    #[test]
    fn root_relative_links_join_the_stripped_page_url() {
        assert_eq!(
            resolve_career_link("https://x.com/company/careers", "/jobs/1-analyst").as_deref(),
            Some("https://x.com/company/jobs/1-analyst")
        );
        assert_eq!(
            resolve_career_link("https://x.com/", "/jobs/2-designer").as_deref(),
            Some("https://x.com/jobs/2-designer")
        );
    }

    #[test]
    fn career_links_keep_absolute_and_protocol_relative_urls() {
        assert_eq!(
            resolve_career_link("https://x.com/careers", "https://other.io/job/1").as_deref(),
            Some("https://other.io/job/1")
        );
        assert_eq!(
            resolve_career_link("https://x.com/careers", "//cdn.x.com/job/1").as_deref(),
            Some("https://cdn.x.com/job/1")
        );
        assert_eq!(resolve_career_link("https://x.com/careers", "mailto:jobs@x.com"), None);
        assert_eq!(resolve_career_link("https://x.com/careers", "#top"), None);
    }

    #[test]
    fn board_links_resolve_against_board_url() {
        assert_eq!(
            resolve_against("https://boards.greenhouse.io/acme", "/acme/jobs/1").as_deref(),
            Some("https://boards.greenhouse.io/acme/jobs/1")
        );
    }

    #[test]
    fn titles_are_filtered() {
        assert!(is_acceptable_title("Data Engineer"));
        assert!(!is_acceptable_title("QA"));
        assert!(!is_acceptable_title("View all jobs"));
        assert!(!is_acceptable_title("Browse Departments"));
    }

    #[test]
    fn finds_location_in_sibling() {
        let html = Html::parse_document(
            r#"<div class="opening"><a href="/acme/jobs/1">Engineer</a><span class="location">Berlin</span></div>"#,
        );
        let a = html.select(&Selector::parse("a").unwrap()).next().unwrap();
        assert_eq!(nearby_location(a).as_deref(), Some("Berlin"));
    }

    #[test]
    fn strips_location_suffix_from_title() {
        assert_eq!(
            title_without_location("Senior Engineer Remote", Some("Remote")),
            "Senior Engineer"
        );
        assert_eq!(title_without_location("Engineer", None), "Engineer");
    }
}
