use thiserror::Error;

/// Result type alias for webhook-router operations
pub type Result<T, E = WebhookRouterError> = std::result::Result<T, E>;

/// Errors that stop the router from starting or serving
#[derive(Error, Debug)]
pub enum WebhookRouterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] crate::config::ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Shutdown signal error: {0}")]
    ShutdownSignal(#[from] crate::shutdown::ShutdownSignalError),
}

/// Failures of the durable store backing the tenant registry and dead-letter table
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid database url: {0}")]
    InvalidDatabaseUrl(String),
}

/// Errors returned by registry management operations
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Reasons an inbound request fails authentication
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,

    #[error("signature does not match request body")]
    Mismatch,
}

/// Reasons an inbound body is not a routable page event batch
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("object is not \"page\"")]
    NotPage,

    #[error("entry is missing or empty")]
    NoEntries,
}

/// Transport-level outcome of a single forward that did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),
}
