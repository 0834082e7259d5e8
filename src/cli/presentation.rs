//! CLI presentation: text formatters per command family (comfy-table + styled headings).

use crate::catalog::SectionCatalog;
use crate::orchestrator::{CompileResult, RunStatusReport};
use crate::run::RunStatus;
use crate::section::SectionStatus;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn styled_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Generated | RunStatus::Compiled => status.as_str().green().to_string(),
        RunStatus::Failed => status.as_str().red().to_string(),
        RunStatus::Pending | RunStatus::Generating => status.as_str().yellow().to_string(),
    }
}

fn section_status_label(status: SectionStatus) -> &'static str {
    match status {
        SectionStatus::Pending => "pending",
        SectionStatus::Generating => "generating",
        SectionStatus::Completed => "completed",
        SectionStatus::Failed => "FAILED",
    }
}

pub fn format_catalog_text(catalog: &SectionCatalog) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Catalog: {}", catalog.document_type))
    ));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Section", "Title", "Category", "Priority", "Words"]);
    for (index, section) in catalog.sections.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            section.id.clone(),
            section.title.clone(),
            section.category.clone(),
            section.priority.as_str().to_string(),
            section.estimated_size.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_run_status_text(report: &RunStatusReport) -> String {
    let agg = &report.aggregate;
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Run {}", report.run_id))
    ));
    out.push_str(&format!("  Document type: {}\n", report.document_type));
    out.push_str(&format!("  Status: {}\n", styled_run_status(report.status)));
    out.push_str(&format!(
        "  Sections: {} completed, {} failed, {} generating, {} pending ({} total)\n",
        agg.completed, agg.failed, agg.generating, agg.pending, agg.total
    ));
    out.push_str(&format!(
        "  Progress: {}% (sections), {}% (batches)\n",
        agg.percent, report.batch_progress
    ));
    if report.is_partially_complete {
        out.push_str(&format!(
            "  {}\n",
            "Partially complete: failed sections can be retried".yellow()
        ));
    }
    out.push_str(&format!(
        "  Compiled: {}\n\n",
        if report.compiled { "yes" } else { "no" }
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Section", "Status", "Progress", "Retries", "Data", "Last error"]);
    for section in &report.sections {
        let data = match section.status {
            SectionStatus::Completed if section.is_fallback() => "display only",
            SectionStatus::Completed => "yes",
            _ => "-",
        };
        table.add_row(vec![
            section.section_id.clone(),
            section_status_label(section.status).to_string(),
            format!("{}%", section.progress_percent),
            section.retry_count.to_string(),
            data.to_string(),
            section.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_compile_result_text(result: &CompileResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Compiled")));
    out.push_str(&format!("  Run: {}\n", result.document.run_id));
    out.push_str(&format!("  Output: {}\n", result.artifact.path.display()));
    out.push_str(&format!(
        "  Sections: {} of {}\n",
        result.artifact.section_count, result.document.total_count
    ));
    out.push_str(&format!("  Bytes: {}\n", result.artifact.bytes));
    out.push_str(&format!("  Run status: {}\n", styled_run_status(result.status)));
    if result.document.is_partially_complete {
        out.push_str(&format!(
            "  {}\n",
            format!(
                "Partial document: {} failed section(s) omitted",
                result.document.failed_count
            )
            .yellow()
        ));
    }
    out
}

pub fn format_history_text(runs: &[RunStatusReport]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Run history")));
    if runs.is_empty() {
        out.push_str("No runs recorded.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Run", "Type", "Status", "Completed", "Failed", "Created"]);
    for run in runs {
        table.add_row(vec![
            run.run_id.to_string(),
            run.document_type.clone(),
            run.status.as_str().to_string(),
            format!("{}/{}", run.aggregate.completed, run.aggregate.total),
            run.aggregate.failed.to_string(),
            run.created_at.clone(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}
