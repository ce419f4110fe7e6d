use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::hub::{Session, SessionError};

/// A connected WebSocket client as seen by the broadcast hub.
///
/// Frames are queued on `sender`; the connection's writer task drains the
/// queue onto the socket. Once that task ends the queue closes and the
/// client reports itself closed.
#[derive(Debug, Clone)]
pub struct Client {
    /// Connection id, `client-<uuid>`.
    pub id: String,

    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", uuid::Uuid::new_v4()),
            sender,
        }
    }
}

#[async_trait]
impl Session for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.sender
            .send(WsMessage::text(text.to_string()))
            .map_err(|_| SessionError::Closed(self.id.clone()))
    }
}
