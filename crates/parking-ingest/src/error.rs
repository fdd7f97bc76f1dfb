//! Error types for the ingestion service.

use parking_db::DbError;

/// Errors raised while ingesting one bus message.
///
/// None of these stop the consumer loop: the message is logged and
/// dropped, and the next one is processed.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload could not be understood.
    #[error("malformed payload on {topic}: {reason}")]
    Malformed {
        /// Subject the message arrived on.
        topic: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The store rejected the write.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl IngestError {
    pub(crate) fn malformed(topic: &str, reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            topic: topic.to_owned(),
            reason: reason.to_string(),
        }
    }
}
