use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};
use serde::Deserialize;

use mochiport_gateway::connection;

use crate::error::{ApiError, ApiQuery};
use crate::middleware::decode_claims;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RealtimeParams {
    pub token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token
/// travels in the query string.
pub async fn upgrade(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RealtimeParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let client = match state.jwt_secret.as_deref() {
        Some(secret) => {
            let token = params
                .token
                .ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
            Some(decode_claims(&token, secret)?.sub)
        }
        None => None,
    };

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, client)))
}
