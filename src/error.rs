use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HipsError {
    #[error("invalid object id: {0}")]
    InvalidDsoId(String),

    #[error("invalid catalog record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("duplicate object id in catalog: {0}")]
    DuplicateId(String),

    #[error("object not in catalog: {0}")]
    UnknownDso(String),

    #[error("catalog is empty")]
    EmptyCatalog,

    #[error("failed to read catalog file at {0}")]
    CatalogRead(PathBuf),

    #[error("failed to parse catalog: {0}")]
    CatalogParse(String),

    #[error("working directory {0} not found (run from the viewer app directory)")]
    #[diagnostic(help("the parent directory of output_base must already exist"))]
    MissingWorkingDir(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("tile server request failed: {0}")]
    Http(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("manifest error: {0}")]
    Manifest(String),
}
