//! Error types for reading target files and configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("File size of {found} bytes exceeds the maximum allowed size of {limit} bytes.")]
    FileTooLarge { limit: u64, found: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("An underlying I/O error occurred: {0}")]
    StdIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IoError>;
