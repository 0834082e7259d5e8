//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output, with a hint where one helps.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::RunNotFound(_) => format!("{}\nUse `folio history` to list known runs.", e),
        ApiError::Timeout(run_id) => format!(
            "{}\nProgress is still recorded; check it later with `folio status --run {}`.",
            e, run_id
        ),
        ApiError::NothingToCompile(run_id) => format!(
            "{}\nRetry failed sections with `folio retry --run {}`.",
            e, run_id
        ),
        other => other.to_string(),
    }
}
