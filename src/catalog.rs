//! Section catalog: the static, ordered list of sections a document type offers.
//!
//! Catalog order is significant. It fixes batch order during generation and section
//! order in the assembled document.

use crate::error::ApiError;
use crate::types::SectionId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionPriority {
    High,
    Medium,
    Low,
}

impl SectionPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionPriority::High => "high",
            SectionPriority::Medium => "medium",
            SectionPriority::Low => "low",
        }
    }
}

/// Immutable description of one generatable section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub id: SectionId,
    pub title: String,
    pub category: String,
    pub priority: SectionPriority,
    /// Target length in words.
    pub estimated_size: u32,
    /// Extra instructions for the content service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCatalog {
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub sections: Vec<SectionDefinition>,
}

impl SectionCatalog {
    pub fn new(document_type: impl Into<String>, sections: Vec<SectionDefinition>) -> Result<Self, ApiError> {
        let catalog = Self {
            document_type: document_type.into(),
            title: None,
            sections,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.document_type.trim().is_empty() {
            return Err(ApiError::Catalog("document type cannot be empty".to_string()));
        }
        if self.sections.is_empty() {
            return Err(ApiError::Catalog(format!(
                "catalog '{}' has no sections",
                self.document_type
            )));
        }
        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.id.trim().is_empty() {
                return Err(ApiError::Catalog("section id cannot be empty".to_string()));
            }
            if section.title.trim().is_empty() {
                return Err(ApiError::Catalog(format!(
                    "section '{}' has an empty title",
                    section.id
                )));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(ApiError::Catalog(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ApiError> {
        let catalog: SectionCatalog = toml::from_str(raw)
            .map_err(|e| ApiError::Catalog(format!("invalid catalog file: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Catalog(format!("failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Catalog for `document_type`: `<dir>/<document_type>.toml` when present, else built-in.
    pub fn resolve(document_type: &str, dir: Option<&Path>) -> Result<Self, ApiError> {
        if let Some(dir) = dir {
            let candidate = dir.join(format!("{}.toml", document_type));
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        Self::builtin(document_type).ok_or_else(|| {
            ApiError::Catalog(format!("no catalog found for document type '{}'", document_type))
        })
    }

    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.document_type.replace('-', " "))
    }

    pub fn get(&self, id: &str) -> Option<&SectionDefinition> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|s| s.id.clone()).collect()
    }

    /// Resolve a caller selection into catalog order.
    ///
    /// Duplicates collapse to one entry; any id outside the catalog is rejected.
    pub fn select<S: AsRef<str>>(&self, selected: &[S]) -> Result<Vec<SectionDefinition>, ApiError> {
        if selected.is_empty() {
            return Err(ApiError::EmptySelection);
        }
        let mut wanted = HashSet::new();
        for id in selected {
            let id = id.as_ref().trim();
            if self.get(id).is_none() {
                return Err(ApiError::UnknownSection(id.to_string()));
            }
            wanted.insert(id.to_string());
        }
        Ok(self
            .sections
            .iter()
            .filter(|s| wanted.contains(&s.id))
            .cloned()
            .collect())
    }

    pub fn builtin_types() -> &'static [&'static str] {
        &["business-plan", "market-report"]
    }

    pub fn builtin(document_type: &str) -> Option<Self> {
        let rows: &[(&str, &str, &str, SectionPriority, u32)] = match document_type {
            "business-plan" => &[
                ("executive-summary", "Executive Summary", "overview", SectionPriority::High, 400),
                ("company-description", "Company Description", "overview", SectionPriority::High, 500),
                ("market-analysis", "Market Analysis", "market", SectionPriority::High, 900),
                ("competitive-landscape", "Competitive Landscape", "market", SectionPriority::Medium, 700),
                ("products-services", "Products and Services", "offering", SectionPriority::Medium, 600),
                ("marketing-strategy", "Marketing Strategy", "strategy", SectionPriority::Medium, 700),
                ("operations-plan", "Operations Plan", "strategy", SectionPriority::Low, 600),
                ("management-team", "Management Team", "organization", SectionPriority::Low, 400),
                ("financial-projections", "Financial Projections", "finance", SectionPriority::High, 800),
                ("funding-request", "Funding Request", "finance", SectionPriority::Medium, 300),
            ],
            "market-report" => &[
                ("overview", "Market Overview", "overview", SectionPriority::High, 500),
                ("segmentation", "Segmentation", "market", SectionPriority::High, 700),
                ("trends", "Key Trends", "market", SectionPriority::Medium, 600),
                ("competitors", "Competitor Profiles", "market", SectionPriority::Medium, 800),
                ("regulation", "Regulatory Environment", "context", SectionPriority::Low, 400),
                ("outlook", "Outlook and Forecast", "finance", SectionPriority::High, 600),
            ],
            _ => return None,
        };
        let sections = rows
            .iter()
            .map(|(id, title, category, priority, size)| SectionDefinition {
                id: (*id).to_string(),
                title: (*title).to_string(),
                category: (*category).to_string(),
                priority: *priority,
                estimated_size: *size,
                prompt: None,
            })
            .collect();
        Some(Self {
            document_type: document_type.to_string(),
            title: None,
            sections,
        })
    }
}
