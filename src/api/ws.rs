use actix_web::{HttpRequest, HttpResponse, rt, web};
use actix_ws::{CloseReason, Message};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{auth::bearer_token, jwt::verify_token};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::TokenType;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Real-time channel. Browsers cannot set headers on a websocket upgrade,
/// so the access token may also come as `?token=`.
pub async fn connect(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<WsQuery>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let token = query
        .token
        .as_deref()
        .or_else(|| bearer_token(&req))
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;
    let claims = verify_token(token, &config.jwt_secret)
        .ok()
        .filter(|c| c.token_type == TokenType::Access)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    let (response, mut session, mut frames) = actix_ws::handle(&req, body).map_err(|e| {
        debug!(error = %e, "Websocket handshake failed");
        AppError::validation("Websocket upgrade required")
    })?;

    let notifier = state.notifier.clone();
    let (id, mut outbound) = notifier.connect(state.clock.now()).await;
    info!(connection_id = id, user_id = %claims.user_id, "Websocket connected");

    rt::spawn(async move {
        let mut close: Option<CloseReason> = None;
        loop {
            tokio::select! {
                Some(text) = outbound.recv() => {
                    if session.text(text).await.is_err() {
                        break;
                    }
                }
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        notifier.handle_client_message(id, &text).await;
                    }
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        close = reason;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(connection_id = id, error = %e, "Websocket protocol error");
                        break;
                    }
                    None => break,
                },
            }
        }

        notifier.disconnect(id).await;
        let _ = session.close(close).await;
        info!(connection_id = id, "Websocket disconnected");
    });

    Ok(response)
}
