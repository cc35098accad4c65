use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Pre and Post date ranges are both required")]
    MissingDateRange,

    #[error("Unreadable input file {path}: {details}")]
    Unreadable { path: String, details: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
