//! Errors the substrate client surfaces — deliberately distinguishing a
//! stage timeout (the normal "no work available" case) from a real
//! connectivity or scripting failure, so callers don't have to parse
//! error strings to tell them apart.

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("connection to substrate lost: {0}")]
    ConnectionLost(String),

    #[error("atomic script failed: {0}")]
    Script(String),

    #[error("failed to serialize payload: {0}")]
    Serialization(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        QueueError::ConnectionLost(e.to_string())
    }
}
