//! HTTP API
//!
//! - `POST /kafka/send`: body is an envelope with a text payload; publishes
//!   it and answers with an [`ApiResponse`].
//! - `GET /kafka/health`: always a success response.
//!
//! The HTTP status mirrors `statusCode`. A body that does not decode is
//! answered with the same structured 400 as a failed publish.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::message::{ApiResponse, try_decode};
use crate::relay::RelayService;
use crate::relay::service::SEND_FAILED;
use crate::utils::RelayError;

pub fn router(relay: Arc<RelayService>) -> Router {
    Router::new()
        .route("/kafka/send", post(send_message))
        .route("/kafka/health", get(health))
        .with_state(relay)
}

pub async fn start_http_server(addr: &str, relay: Arc<RelayService>) -> Result<(), RelayError> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on http://{}", addr);
    serve_http(listener, relay).await
}

pub async fn serve_http(listener: TcpListener, relay: Arc<RelayService>) -> Result<(), RelayError> {
    axum::serve(listener, router(relay)).await?;
    Ok(())
}

async fn send_message(
    State(relay): State<Arc<RelayService>>,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    let response = match try_decode::<String>(&body) {
        Ok(envelope) => relay.send_message(envelope).await,
        Err(e) => {
            warn!(error = %e, "Rejected malformed publish request");
            ApiResponse::error(SEND_FAILED, vec![e.to_string()])
        }
    };
    respond(response)
}

async fn health(State(relay): State<Arc<RelayService>>) -> (StatusCode, Json<ApiResponse>) {
    respond(relay.health())
}

fn respond(response: ApiResponse) -> (StatusCode, Json<ApiResponse>) {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}
