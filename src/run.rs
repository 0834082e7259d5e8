//! Generation run: the selected sections of one caller request and their aggregate state.

use crate::catalog::SectionDefinition;
use crate::section::{now_rfc3339, SectionStatus, SectionTaskState};
use crate::types::{RunContext, RunId, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Generating,
    Generated,
    Failed,
    Compiled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Generating => "generating",
            RunStatus::Generated => "generated",
            RunStatus::Failed => "failed",
            RunStatus::Compiled => "compiled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Generated | RunStatus::Failed | RunStatus::Compiled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification applied when every selected section is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Complete,
    PartiallyComplete,
    Failed,
}

impl RunOutcome {
    pub fn classify(aggregate: &RunAggregate) -> Self {
        if aggregate.completed == 0 {
            RunOutcome::Failed
        } else if aggregate.failed == 0 {
            RunOutcome::Complete
        } else {
            RunOutcome::PartiallyComplete
        }
    }

    pub fn run_status(self) -> RunStatus {
        match self {
            RunOutcome::Complete | RunOutcome::PartiallyComplete => RunStatus::Generated,
            RunOutcome::Failed => RunStatus::Failed,
        }
    }

    pub fn is_partially_complete(self) -> bool {
        matches!(self, RunOutcome::PartiallyComplete)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAggregate {
    pub total: usize,
    pub pending: usize,
    pub generating: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean of the per-section progress percents.
    pub percent: u8,
}

impl RunAggregate {
    pub fn from_sections<'a>(sections: impl Iterator<Item = &'a SectionTaskState>) -> Self {
        let mut aggregate = RunAggregate::default();
        let mut percent_sum = 0u64;
        for state in sections {
            aggregate.total += 1;
            percent_sum += u64::from(state.progress_percent);
            match state.status {
                SectionStatus::Pending => aggregate.pending += 1,
                SectionStatus::Generating => aggregate.generating += 1,
                SectionStatus::Completed => aggregate.completed += 1,
                SectionStatus::Failed => aggregate.failed += 1,
            }
        }
        if aggregate.total > 0 {
            aggregate.percent = (percent_sum / aggregate.total as u64) as u8;
        }
        aggregate
    }

    pub fn done(&self) -> usize {
        self.completed + self.failed
    }

    pub fn is_settled(&self) -> bool {
        self.total > 0 && self.done() == self.total
    }

    /// `pending + generating + completed + failed == total`.
    pub fn is_consistent(&self) -> bool {
        self.pending + self.generating + self.completed + self.failed == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub run_id: RunId,
    pub context: RunContext,
    /// Selected section ids in catalog order.
    pub selected: Vec<SectionId>,
    pub created_at: String,
    pub status: RunStatus,
    pub sections: HashMap<SectionId, SectionTaskState>,
    #[serde(default)]
    pub batch_progress: u8,
    #[serde(default)]
    pub is_partially_complete: bool,
    #[serde(default)]
    pub compiled: bool,
    #[serde(default)]
    pub finalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl GenerationRun {
    /// Build a Pending run; `selected` must already be in catalog order.
    pub fn new(run_id: RunId, context: RunContext, selected: &[SectionDefinition]) -> Self {
        let ids: Vec<SectionId> = selected.iter().map(|s| s.id.clone()).collect();
        let sections = ids
            .iter()
            .map(|id| (id.clone(), SectionTaskState::new(id.clone())))
            .collect();
        Self {
            run_id,
            context,
            selected: ids,
            created_at: now_rfc3339(),
            status: RunStatus::Pending,
            sections,
            batch_progress: 0,
            is_partially_complete: false,
            compiled: false,
            finalized: false,
            completed_at: None,
        }
    }

    pub fn aggregate(&self) -> RunAggregate {
        RunAggregate::from_sections(self.sections.values())
    }

    pub fn section(&self, id: &str) -> Option<&SectionTaskState> {
        self.sections.get(id)
    }

    /// Section states in selection (catalog) order.
    pub fn ordered_sections(&self) -> Vec<&SectionTaskState> {
        self.selected
            .iter()
            .filter_map(|id| self.sections.get(id))
            .collect()
    }

    /// Completed sections in selection order; failed and unfinished sections are excluded.
    pub fn completed_in_order(&self) -> Vec<&SectionTaskState> {
        self.ordered_sections()
            .into_iter()
            .filter(|s| s.status == SectionStatus::Completed)
            .collect()
    }

    pub fn ids_with_status(&self, status: SectionStatus) -> Vec<SectionId> {
        self.ordered_sections()
            .into_iter()
            .filter(|s| s.status == status)
            .map(|s| s.section_id.clone())
            .collect()
    }

    /// Apply the terminal classification.
    pub fn apply_outcome(&mut self, outcome: RunOutcome) {
        self.status = outcome.run_status();
        self.is_partially_complete = outcome.is_partially_complete();
        self.finalized = true;
        self.batch_progress = 100;
        self.completed_at = Some(now_rfc3339());
    }
}
