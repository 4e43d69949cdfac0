use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to encode audit event: {0}")]
    EventError(#[from] events::EventsError),

    #[error("Audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("The requested data was not found: {0}")]
    NotFound(String),

    #[error("An execution for account {account_id} and signal {signal_id} is already journaled")]
    DuplicateExecution { account_id: Uuid, signal_id: Uuid },

    /// The persisted state no longer matches what the caller validated against.
    #[error("Write refused: {0}")]
    Conflict(String),

    #[error("Stored row could not be decoded: {0}")]
    InvalidRow(String),
}
