//! Folio: Sectioned Document Generation
//!
//! Generates a multi-section document by calling a content generation service once per
//! section, in fixed-size concurrent batches, with per-section retry and partial-completion
//! tolerance. Completed sections are projected into a document structure and handed to a
//! document compiler.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod report;
pub mod run;
pub mod section;
pub mod types;

pub use catalog::{SectionCatalog, SectionDefinition, SectionPriority};
pub use error::{ApiError, ServiceError, StorageError};
pub use orchestrator::{Orchestrator, RunStatusReport};
pub use run::{GenerationRun, RunAggregate, RunStatus};
pub use section::{SectionStatus, SectionTaskState};
pub use types::{RunContext, RunId, SectionId};
