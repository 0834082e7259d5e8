//! Report assembly: projects a run's completed sections into a document structure.
//! Side-effect free; callable on finished and in-progress runs alike.

use crate::catalog::SectionCatalog;
use crate::run::GenerationRun;
use crate::types::{RunId, SectionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledSection {
    pub id: SectionId,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub run_id: RunId,
    pub document_type: String,
    pub title: String,
    pub is_partially_complete: bool,
    pub completed_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub ordered_sections: Vec<AssembledSection>,
}

impl DocumentStructure {
    pub fn is_empty(&self) -> bool {
        self.ordered_sections.is_empty()
    }

    pub fn section_ids(&self) -> Vec<&str> {
        self.ordered_sections.iter().map(|s| s.id.as_str()).collect()
    }
}

pub fn assemble_document(run: &GenerationRun, catalog: &SectionCatalog) -> DocumentStructure {
    let aggregate = run.aggregate();
    let mut completed = run.completed_in_order();
    completed.sort_by_key(|s| catalog.position(&s.section_id).unwrap_or(usize::MAX));

    let ordered_sections = completed
        .into_iter()
        .map(|state| AssembledSection {
            id: state.section_id.clone(),
            title: catalog
                .get(&state.section_id)
                .map(|d| d.title.clone())
                .unwrap_or_else(|| state.section_id.clone()),
            content: state.content.clone().unwrap_or_default(),
            structured_data: state.structured_data.clone(),
        })
        .collect::<Vec<_>>();

    DocumentStructure {
        run_id: run.run_id.clone(),
        document_type: run.context.document_type.clone(),
        title: catalog.display_title(),
        is_partially_complete: !ordered_sections.is_empty()
            && ordered_sections.len() < aggregate.total,
        completed_count: aggregate.completed,
        failed_count: aggregate.failed,
        total_count: aggregate.total,
        ordered_sections,
    }
}
