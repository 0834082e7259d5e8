//! Document compiler seam.
//!
//! A compiler turns an assembled document into an artifact. Compilation can run any
//! number of times against the same run; its failures never change the run's
//! generation status.

use crate::error::ApiError;
use crate::report::assembly::DocumentStructure;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "Invalid output format: {} (must be 'markdown' or 'json')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub section_count: usize,
    pub bytes: usize,
}

pub trait DocumentCompiler: Send + Sync {
    fn compile(&self, document: &DocumentStructure) -> Result<CompiledArtifact, ApiError>;
}

fn write_artifact(
    output_dir: &Path,
    document: &DocumentStructure,
    format: OutputFormat,
    body: String,
) -> Result<CompiledArtifact, ApiError> {
    std::fs::create_dir_all(output_dir).map_err(|e| {
        ApiError::Compilation(format!(
            "failed to create output directory {}: {}",
            output_dir.display(),
            e
        ))
    })?;
    let path = output_dir.join(format!("{}.{}", document.run_id, format.extension()));
    std::fs::write(&path, body.as_bytes()).map_err(|e| {
        ApiError::Compilation(format!("failed to write {}: {}", path.display(), e))
    })?;
    Ok(CompiledArtifact {
        path,
        format,
        section_count: document.ordered_sections.len(),
        bytes: body.len(),
    })
}

/// Renders headings and section bodies as Markdown; structured data goes into fenced JSON.
pub struct MarkdownCompiler {
    output_dir: PathBuf,
}

impl MarkdownCompiler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn render(document: &DocumentStructure) -> Result<String, ApiError> {
        let mut out = String::new();
        let render_err = |e: std::fmt::Error| ApiError::Compilation(e.to_string());
        writeln!(out, "# {}", title_case(&document.title)).map_err(render_err)?;
        if document.is_partially_complete {
            writeln!(
                out,
                "\n> Partial document: {} of {} sections generated.",
                document.ordered_sections.len(),
                document.total_count
            )
            .map_err(render_err)?;
        }
        for section in &document.ordered_sections {
            writeln!(out, "\n## {}\n\n{}", section.title, section.content.trim())
                .map_err(render_err)?;
            if let Some(data) = &section.structured_data {
                let pretty = serde_json::to_string_pretty(data)
                    .map_err(|e| ApiError::Compilation(e.to_string()))?;
                writeln!(out, "\n```json\n{}\n```", pretty).map_err(render_err)?;
            }
        }
        Ok(out)
    }
}

impl DocumentCompiler for MarkdownCompiler {
    fn compile(&self, document: &DocumentStructure) -> Result<CompiledArtifact, ApiError> {
        let body = Self::render(document)?;
        write_artifact(&self.output_dir, document, OutputFormat::Markdown, body)
    }
}

/// Writes the document structure verbatim as pretty JSON.
pub struct JsonCompiler {
    output_dir: PathBuf,
}

impl JsonCompiler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl DocumentCompiler for JsonCompiler {
    fn compile(&self, document: &DocumentStructure) -> Result<CompiledArtifact, ApiError> {
        let body = serde_json::to_string_pretty(document)
            .map_err(|e| ApiError::Compilation(e.to_string()))?;
        write_artifact(&self.output_dir, document, OutputFormat::Json, body)
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
