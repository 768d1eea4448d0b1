use std::fmt;

use serde::{Deserialize, Serialize};

/// ATS backends the classifier can recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtsBackend {
    Greenhouse,
    Lever,
    Ashby,
    Workday,
    Jobvite,
    BambooHR,
    Generic,
}

impl AtsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtsBackend::Greenhouse => "Greenhouse",
            AtsBackend::Lever => "Lever",
            AtsBackend::Ashby => "Ashby",
            AtsBackend::Workday => "Workday",
            AtsBackend::Jobvite => "Jobvite",
            AtsBackend::BambooHR => "BambooHR",
            AtsBackend::Generic => "Generic",
        }
    }

    /// Parse a registry `ats` value. Empty or unrecognised values mean the
    /// backend is not known up front.
    pub fn from_registry(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "greenhouse" => Some(AtsBackend::Greenhouse),
            "lever" => Some(AtsBackend::Lever),
            "ashby" | "ashbyhq" => Some(AtsBackend::Ashby),
            "workday" | "myworkdayjobs" => Some(AtsBackend::Workday),
            "jobvite" => Some(AtsBackend::Jobvite),
            "bamboohr" | "bamboo" => Some(AtsBackend::BambooHR),
            "generic" => Some(AtsBackend::Generic),
            _ => None,
        }
    }

    /// Workday boards are rendered client-side and cannot be extracted.
    pub fn is_extractable(&self) -> bool {
        !matches!(self, AtsBackend::Workday)
    }
}

impl fmt::Display for AtsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub backend: AtsBackend,
    pub slug: Option<String>,
}

impl DetectionResult {
    pub fn generic() -> Self {
        Self {
            backend: AtsBackend::Generic,
            slug: None,
        }
    }
}
