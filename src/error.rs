use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to access the data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("the data file could not be (de)serialized: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(what: T) -> Self {
        StoreError::NotFound(what.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
