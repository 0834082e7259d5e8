//! Per-section task state and its transition rules.
//!
//! Transitions are monotonic: `Pending -> Generating -> {Completed | Failed}`, with
//! `Generating -> Pending` only when a retry is scheduled and `Failed -> Pending` only
//! through a manual retry.

use crate::error::ApiError;
use crate::provider::GeneratedContent;
use crate::types::SectionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const PERCENT_PENDING: u8 = 0;
pub const PERCENT_GENERATING: u8 = 50;
pub const PERCENT_TERMINAL: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl SectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionStatus::Pending => "pending",
            SectionStatus::Generating => "generating",
            SectionStatus::Completed => "completed",
            SectionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SectionStatus::Completed | SectionStatus::Failed)
    }

    /// Whether a worker-reported move from `self` to `next` is legal.
    /// `Failed -> Pending` is excluded; only a manual retry reset performs it.
    pub fn can_advance_to(self, next: SectionStatus) -> bool {
        matches!(
            (self, next),
            (SectionStatus::Pending, SectionStatus::Generating)
                | (SectionStatus::Generating, SectionStatus::Completed)
                | (SectionStatus::Generating, SectionStatus::Failed)
                | (SectionStatus::Generating, SectionStatus::Pending)
        )
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTaskState {
    pub section_id: SectionId,
    pub status: SectionStatus,
    pub progress_percent: u8,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: String,
}

impl SectionTaskState {
    pub fn new(section_id: impl Into<SectionId>) -> Self {
        Self {
            section_id: section_id.into(),
            status: SectionStatus::Pending,
            progress_percent: PERCENT_PENDING,
            retry_count: 0,
            content: None,
            structured_data: None,
            last_error: None,
            updated_at: now_rfc3339(),
        }
    }

    /// Display-only output: content present, structured data absent.
    pub fn is_fallback(&self) -> bool {
        self.status == SectionStatus::Completed && self.structured_data.is_none()
    }

    /// Pending -> Generating.
    pub fn begin_attempt(&mut self) -> Result<(), ApiError> {
        self.ensure_status(SectionStatus::Pending, SectionStatus::Generating)?;
        self.status = SectionStatus::Generating;
        self.progress_percent = PERCENT_GENERATING;
        self.touch();
        Ok(())
    }

    /// Generating -> Completed.
    pub fn complete(&mut self, generated: GeneratedContent) -> Result<(), ApiError> {
        self.ensure_status(SectionStatus::Generating, SectionStatus::Completed)?;
        self.status = SectionStatus::Completed;
        self.progress_percent = PERCENT_TERMINAL;
        self.content = Some(generated.display_payload);
        self.structured_data = generated.structured_data;
        self.last_error = None;
        self.touch();
        Ok(())
    }

    /// Generating -> Pending, consuming one unit of retry budget.
    pub fn schedule_retry(&mut self, error: impl Into<String>) -> Result<(), ApiError> {
        self.ensure_status(SectionStatus::Generating, SectionStatus::Pending)?;
        self.status = SectionStatus::Pending;
        self.progress_percent = PERCENT_PENDING;
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.touch();
        Ok(())
    }

    /// Generating -> Failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), ApiError> {
        self.ensure_status(SectionStatus::Generating, SectionStatus::Failed)?;
        self.status = SectionStatus::Failed;
        self.progress_percent = PERCENT_TERMINAL;
        self.last_error = Some(error.into());
        self.touch();
        Ok(())
    }

    /// Failed -> Pending with a fresh retry budget.
    pub fn reset_for_manual_retry(&mut self) -> Result<(), ApiError> {
        self.ensure_status(SectionStatus::Failed, SectionStatus::Pending)?;
        self.status = SectionStatus::Pending;
        self.progress_percent = PERCENT_PENDING;
        self.retry_count = 0;
        self.touch();
        Ok(())
    }

    fn ensure_status(&self, from: SectionStatus, to: SectionStatus) -> Result<(), ApiError> {
        if self.status != from {
            return Err(ApiError::InvalidTransition {
                section_id: self.section_id.clone(),
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
