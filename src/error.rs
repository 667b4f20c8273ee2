use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GdcEmError {
    #[error("config file not found: {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GDC client error: {0}")]
    Http(String),

    #[error("metadata query failed for site {site}: {message}")]
    Retrieval { site: String, message: String },

    #[error("GDC files endpoint returned status {status} for site {site}: {message}")]
    RetrievalStatus {
        site: String,
        status: u16,
        message: String,
    },

    #[error("download failed for file {file_id} (sample {sample_id}): {message}")]
    Fetch {
        file_id: String,
        sample_id: String,
        message: String,
    },

    #[error("GDC data endpoint returned status {status} for file {file_id} (sample {sample_id})")]
    FetchStatus {
        file_id: String,
        sample_id: String,
        status: u16,
    },

    #[error("file {file_id} (sample {sample_id}) is missing required column {column}")]
    MissingColumn {
        file_id: String,
        sample_id: String,
        column: String,
    },

    #[error("failed to decode file {file_id} (sample {sample_id}): {message}")]
    Decode {
        file_id: String,
        sample_id: String,
        message: String,
    },

    #[error("failed to write {path}: {message}")]
    Export { path: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
