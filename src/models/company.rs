use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::models::detection::AtsBackend;

pub const DEFAULT_COUNTRY: &str = "GLOBAL";

/// A company to scrape, as supplied by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyTarget {
    pub name: String,
    pub career_url: String,
    pub known_ats: Option<AtsBackend>,
    pub known_slug: Option<String>,
    pub country: String,
}

/// One registry row. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegistryEntry {
    name: String,
    url: String,
    ats: String,
    slug: String,
    country: String,
}

impl From<RegistryEntry> for CompanyTarget {
    fn from(entry: RegistryEntry) -> Self {
        let known_slug = Some(entry.slug.trim().to_string()).filter(|s| !s.is_empty());
        let country = if entry.country.trim().is_empty() {
            DEFAULT_COUNTRY.to_string()
        } else {
            entry.country.trim().to_string()
        };
        CompanyTarget {
            name: entry.name.trim().to_string(),
            career_url: entry.url.trim().to_string(),
            known_ats: AtsBackend::from_registry(&entry.ats),
            known_slug,
            country,
        }
    }
}

impl CompanyTarget {
    /// Load the registry file.
    pub fn load(path: &Path) -> Result<Vec<CompanyTarget>, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| AppError::json(path, e))?;
        Self::from_value(value).map_err(|e| AppError::json(path, e))
    }

    /// Accepts either a plain array or an object keyed by array index.
    /// Index-keyed objects are ordered numerically; non-numeric keys sort last.
    pub fn from_value(value: Value) -> Result<Vec<CompanyTarget>, serde_json::Error> {
        let entries: Vec<RegistryEntry> = match value {
            Value::Object(map) => {
                let mut indexed: BTreeMap<(u64, String), Value> = BTreeMap::new();
                for (key, entry) in map {
                    let index = key.parse::<u64>().unwrap_or(u64::MAX);
                    indexed.insert((index, key), entry);
                }
                indexed
                    .into_values()
                    .map(serde_json::from_value)
                    .collect::<Result<_, _>>()?
            }
            other => serde_json::from_value(other)?,
        };

        Ok(entries
            .into_iter()
            .map(CompanyTarget::from)
            .filter(|t| !t.name.is_empty() || !t.career_url.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_keyed_registry_is_ordered_and_defaulted() {
        let value = json!({
            "10": {"name": "Later", "url": "https://later.io/careers"},
            "2": {"name": "Acme", "url": "https://acme.com/careers", "ats": "greenhouse", "slug": "acme", "country": "DE"},
        });
        let targets = CompanyTarget::from_value(value).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "Acme");
        assert_eq!(targets[0].known_ats, Some(AtsBackend::Greenhouse));
        assert_eq!(targets[0].known_slug.as_deref(), Some("acme"));
        assert_eq!(targets[0].country, "DE");

        assert_eq!(targets[1].name, "Later");
        assert_eq!(targets[1].known_ats, None);
        assert_eq!(targets[1].known_slug, None);
        assert_eq!(targets[1].country, DEFAULT_COUNTRY);
    }

    #[test]
    fn array_registry_is_accepted() {
        let value = json!([{"name": "Solo", "url": "https://solo.dev/jobs", "ats": "Lever"}]);
        let targets = CompanyTarget::from_value(value).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].known_ats, Some(AtsBackend::Lever));
    }

    #[test]
    fn empty_rows_are_dropped() {
        let value = json!([{}, {"name": "Kept"}]);
        let targets = CompanyTarget::from_value(value).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].career_url, "");
    }
}
