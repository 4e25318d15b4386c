use std::path::Path;

use crate::error::{PipelineError, Result};

/// Thin wrapper over the PDF text extractor; the pipeline treats this as an
/// external collaborator and only depends on its text output.
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|err| PipelineError::PdfExtract {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
