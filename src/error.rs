use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootError {
    #[error("{0}")]
    Configuration(String),

    #[error("Error retrieving required libraries")]
    Resolution { problems: Vec<String> },

    #[error("{summary} (see {} for complete log)", log_file.display())]
    Unexpected { summary: String, log_file: PathBuf },

    #[error("Invalid artifact pattern: {0}")]
    Pattern(String),

    #[error("Resolution engine error: {0}")]
    Engine(String),

    #[error("Metadata parsing failed: {0}")]
    Metadata(String),

    #[error("Server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BootError {
    /// One-line message for the process exit. Resolution and unexpected
    /// failures have already been reported in full by the update step.
    pub fn headline(&self) -> String {
        match self {
            BootError::Resolution { .. } => "Error retrieving required libraries".to_string(),
            BootError::Unexpected { .. } => "Update failed".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BootError>;
