//! Report domain: pure assembly of completed sections and the document compiler seam.

pub mod assembly;
pub mod compiler;

pub use assembly::{assemble_document, AssembledSection, DocumentStructure};
pub use compiler::{
    CompiledArtifact, DocumentCompiler, JsonCompiler, MarkdownCompiler, OutputFormat,
};
