use std::path::PathBuf;

/// Precondition failures that abort a whole archive or folder conversion.
///
/// Per-line problems never surface here; they are collected as diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("input not found: '{}'", path.display())]
    InputNotFound { path: PathBuf },

    #[error("'{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("'{}' is not a valid zip/.sb3 archive: {source}", path.display())]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("project.json not found in '{}'", path.display())]
    MissingProjectJson { path: PathBuf },

    #[error("invalid project.json in '{}': {message}", path.display())]
    InvalidProjectJson { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("missing value for placeholder '{0}'")]
    MissingPlaceholder(String),
}
