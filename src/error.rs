use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Workbook contains no sheets")]
    EmptyWorkbook,

    #[error("Sheet not found in workbook: {0}")]
    SheetNotFound(String),

    #[error("Sheet '{sheet}' has a missing or empty header row")]
    MissingHeader { sheet: String },

    #[error("Sheet '{sheet}' has {rows} row(s): expected a header row and at least one data row")]
    TooFewRows { sheet: String, rows: usize },

    #[error("Sheet '{sheet}' has no identity column '{column}'")]
    MissingIdentityColumn { sheet: String, column: String },

    #[error("Invalid period token '{0}': expected six digits (YYYYMM)")]
    InvalidPeriod(String),

    #[error("Invalid report schema: {0}")]
    InvalidSchema(String),

    #[error("Field '{field}' is missing from the record")]
    MissingField { field: String },

    #[error("Field '{field}' holds a non-finite value ({value})")]
    NonFiniteValue { field: String, value: f64 },

    #[error("Computation for '{field}' panicked")]
    ComputationPanicked { field: String },

    #[error("Workbook decoding error: {0}")]
    Workbook(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
