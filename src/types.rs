//! Shared identifiers and per-run request metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Catalog identifier of a section.
pub type SectionId = String;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Allocate a fresh run id: `run-<unix millis>-<pid>-<process counter>`.
    ///
    /// The pid keeps ids from separate CLI processes apart when they start in the same
    /// millisecond and share one history database.
    pub fn generate() -> Self {
        let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        RunId(format!(
            "run-{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            std::process::id(),
            seq
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("run id cannot be empty".to_string());
        }
        Ok(RunId(trimmed.to_string()))
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        RunId(value.to_string())
    }
}

/// Request metadata passed to every generation call of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RunContext {
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            requester: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
