//! Error types for the records crate.

use thiserror::Error;

/// Errors that can occur while reading or writing record files.
#[derive(Debug, Error)]
pub enum RecordsError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text parse or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A value in a configuration or header could not be interpreted.
    #[error("Invalid protocol name: {0:?}")]
    InvalidProtocol(String),

    /// No species name was supplied for zero-filling.
    #[error("Target species name is empty")]
    EmptySpecies,
}
