use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: missing required fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Timeout error: operation exceeded {0}ms")]
    Timeout(u64),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsumerError {
    /// Payload-level failures. Redelivering the same bytes can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ConsumerError::Decode(_) | ConsumerError::Validation(_))
    }

    /// Infrastructure failures that may clear up on redelivery.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConsumerError::Store(_) | ConsumerError::Timeout(_))
    }
}

impl From<serde_json::Error> for ConsumerError {
    fn from(err: serde_json::Error) -> Self {
        ConsumerError::Decode(err.to_string())
    }
}

impl From<sqlx::Error> for ConsumerError {
    fn from(err: sqlx::Error) -> Self {
        ConsumerError::Store(format!("PostgreSQL: {err}"))
    }
}

impl From<surrealdb::Error> for ConsumerError {
    fn from(err: surrealdb::Error) -> Self {
        ConsumerError::Store(format!("SurrealDB: {err}"))
    }
}

impl From<lapin::Error> for ConsumerError {
    fn from(err: lapin::Error) -> Self {
        ConsumerError::Broker(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsumerError>;
