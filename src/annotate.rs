use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::job::{JobRecord, Role};

pub const MAX_SCORE: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleKeywords {
    pub role: Role,
    pub keywords: Vec<String>,
}

/// Ordered role keyword table. The first role with a keyword contained in
/// the lower-cased title wins, so order is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTable {
    entries: Vec<RoleKeywords>,
}

impl Default for RoleTable {
    fn default() -> Self {
        let entry = |role: Role, keywords: &[&str]| RoleKeywords {
            role,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        Self {
            entries: vec![
                entry(
                    Role::Design,
                    &["designer", "design", "ux", "ui/ux", "user experience", "user interface", "graphic", "visual", "creative"],
                ),
                entry(
                    Role::Product,
                    &["product manager", "product owner", "product lead", "product"],
                ),
                entry(
                    Role::Business,
                    &["business", "analyst", "operations", "strategy", "sales", "marketing", "finance", "partnership"],
                ),
                entry(
                    Role::Software,
                    &["software", "engineer", "developer", "backend", "frontend", "full stack", "fullstack", "devops", "sre", "data scientist", "machine learning", "programmer"],
                ),
                entry(
                    Role::Client,
                    &["customer", "client", "support", "success", "account manager", "account executive", "onboarding"],
                ),
            ],
        }
    }
}

impl RoleTable {
    pub fn new(entries: Vec<RoleKeywords>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| RoleKeywords {
                role: e.role,
                keywords: e
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { entries }
    }

    /// Load an ordered table from a JSON array of `{role, keywords}`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let entries: Vec<RoleKeywords> =
            serde_json::from_str(&raw).map_err(|e| AppError::json(path, e))?;
        if entries.is_empty() {
            return Err(AppError::BadInput(format!(
                "{} defines no roles",
                path.display()
            )));
        }
        Ok(Self::new(entries))
    }

    pub fn infer_role(&self, title: &str) -> Role {
        let title = title.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.keywords.iter().any(|k| title.contains(k.as_str())))
            .map(|e| e.role)
            .unwrap_or(Role::Other)
    }
}

/// Freshness component: +3 within 3 days, +1 within 7, else 0.
pub fn freshness(posted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u8 {
    let Some(posted_at) = posted_at else {
        return 0;
    };
    let age = now.signed_duration_since(posted_at);
    if age <= Duration::days(3) {
        3
    } else if age <= Duration::days(7) {
        1
    } else {
        0
    }
}

/// Additive score in `0..=MAX_SCORE`.
pub fn score_parts(
    posted_at: Option<DateTime<Utc>>,
    role: Role,
    source: &str,
    apply_link: &str,
    now: DateTime<Utc>,
) -> u8 {
    let mut score = freshness(posted_at, now);

    if matches!(role, Role::Product | Role::Design | Role::Software) {
        score += 2;
    }

    let source = source.to_lowercase();
    if source.contains("greenhouse") || source.contains("lever") {
        score += 2;
    }

    if !apply_link.is_empty() {
        score += 1;
    }

    score.min(MAX_SCORE)
}

pub fn score(job: &JobRecord, now: DateTime<Utc>) -> u8 {
    score_parts(Some(job.posted_at), job.role, &job.source, &job.apply_link, now)
}
