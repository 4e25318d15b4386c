use std::path::PathBuf;

use thiserror::Error;

use crate::paths::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("project name {0:?} sanitizes to an empty slug")]
    InvalidProject(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no {missing} artifact for '{filename}'; run the {missing} stage first")]
    PreconditionNotMet { missing: Stage, filename: String },
    #[error("storage error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact at {path:?} is not valid JSON: {source}")]
    CorruptArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("pdf extraction failed for {path:?}: {message}")]
    PdfExtract { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn precondition(missing: Stage, filename: impl Into<String>) -> Self {
        Self::PreconditionNotMet {
            missing,
            filename: filename.into(),
        }
    }

    /// Client-side errors that should never be retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidProject(_) | Self::InvalidInput(_) | Self::PreconditionNotMet { .. }
        )
    }
}
