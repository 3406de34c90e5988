use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write CSV: {0}")]
    Write(String),

    #[error("CSV has no data rows")]
    Empty,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("Mapped column '{0}' is not in the CSV header")]
    UnknownColumn(String),

    #[error("Too many rows: at most {max} trades can be imported at once")]
    TooManyRows { max: usize },

    #[error("Row {row}: {message}")]
    Row { row: usize, message: String },
}
