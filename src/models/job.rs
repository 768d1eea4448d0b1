use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location used when a board does not expose one near the job link.
pub const UNKNOWN_LOCATION: &str = "Various";

/// Strategy-local posting, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPosting {
    pub title: String,
    pub href: String,
    pub raw_location: Option<String>,
    /// Date reported by the board, when the backend exposes one.
    pub posted_at: Option<DateTime<Utc>>,
}

impl RawPosting {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            raw_location: None,
            posted_at: None,
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.raw_location = location.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn with_posted_at(mut self, posted_at: Option<DateTime<Utc>>) -> Self {
        self.posted_at = posted_at;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Design,
    Product,
    Business,
    Software,
    Client,
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Design => "design",
            Role::Product => "product",
            Role::Business => "business",
            Role::Software => "software",
            Role::Client => "client",
            Role::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary attached later by the requirements extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
}

/// Canonical job record. Field order is the output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub source: String,
    pub apply_link: String,
    pub posted_at: DateTime<Utc>,
    pub role: Role,
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Requirements>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_in_data_model_order() {
        let job = JobRecord {
            id: "greenhouse-acme-123".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: UNKNOWN_LOCATION.into(),
            source: "Acme (Greenhouse)".into(),
            apply_link: "https://boards.greenhouse.io/acme/jobs/123".into(),
            posted_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            role: Role::Software,
            score: 6,
            requirements: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(
            json,
            r#"{"id":"greenhouse-acme-123","title":"Engineer","company":"Acme","location":"Various","source":"Acme (Greenhouse)","applyLink":"https://boards.greenhouse.io/acme/jobs/123","postedAt":"2026-01-02T03:04:05Z","role":"software","score":6}"#
        );
    }

    #[test]
    fn blank_location_is_dropped() {
        let raw = RawPosting::new("Engineer", "/jobs/1").with_location(Some("  ".into()));
        assert_eq!(raw.raw_location, None);
    }

    #[test]
    fn role_display_matches_serialized_name() {
        for role in [Role::Design, Role::Product, Role::Business, Role::Software, Role::Client, Role::Other] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }
}
