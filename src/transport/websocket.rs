use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::hub::BroadcastHub;
use crate::utils::RelayError;

pub async fn start_websocket_server(addr: &str, hub: Arc<BroadcastHub>) -> Result<(), RelayError> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", addr);
    serve_websocket(listener, hub).await;
    Ok(())
}

/// Accepts connections on `listener` until the task is dropped.
pub async fn serve_websocket(listener: TcpListener, hub: Arc<BroadcastHub>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(stream, peer, Arc::clone(&hub)));
            }
            Err(e) => warn!(error = %e, "Failed to accept connection"),
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, hub: Arc<BroadcastHub>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for this client
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    let client_id = client.id.clone();
    hub.register(Arc::new(client));
    info!(client = %client_id, %peer, "Session opened");

    // Forward frames queued by the hub to the socket
    let writer = {
        let hub = Arc::clone(&hub);
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!(client = %client_id, error = %e, "Failed to send message");
                    hub.unregister(&client_id);
                    break;
                }
            }
            debug!(client = %client_id, "Send loop closed");
        })
    };

    // Push-only channel: inbound frames are read only to notice the close
    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(client = %client_id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    hub.unregister(&client_id);
    writer.abort();
    info!(client = %client_id, "Session closed");
}
