use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} is closed")]
    Closed(String),
    #[error("failed to send to session {id}: {reason}")]
    Send { id: String, reason: String },
}

/// A live connection that can receive text frames.
#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn send_text(&self, text: &str) -> Result<(), SessionError>;
}
