use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),
}

impl DbError {
    /// Maps a unique-constraint violation to `Conflict`, naming the entity.
    pub(crate) fn from_insert(err: sqlx::Error, entity: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::Conflict(entity.to_string())
            }
            sqlx::Error::RowNotFound => DbError::NotFound,
            _ => DbError::ConnectionError(err),
        }
    }
}
