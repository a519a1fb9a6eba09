use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRequest, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use gridrally_core::net::messages::{
    ClientMessage, ErrorMsg, JoinResponseMsg, ServerMessage,
};
use gridrally_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, encode_server_message,
};
use gridrally_core::player::PlayerId;
use gridrally_game::course;

use crate::error::AppError;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, AppError> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(AppError::ServiceUnavailable(
            "connection limit reached".to_string(),
        ));
    }

    // Perform WebSocket upgrade manually
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| AppError::BadRequest("not a websocket upgrade".to_string()))?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first message: must be a Join.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };

    let Ok(client_msg) = decode_client_message(&first_msg) else {
        return;
    };

    let join = match client_msg {
        ClientMessage::Join(j) => j,
        _ => return,
    };

    // Validate protocol version
    if join.protocol_version != 0 && join.protocol_version != PROTOCOL_VERSION {
        send_join_error(
            &mut ws_sender,
            &format!(
                "Protocol version mismatch: client={}, server={}",
                join.protocol_version, PROTOCOL_VERSION
            ),
        )
        .await;
        return;
    }

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);

    let joined = {
        let mut lobby = state.lobby.write().await;
        lobby.join(&join.player_name, join.figure, join.is_bot, tx)
    };
    let (player_id, session_token) = match joined {
        Ok(ok) => ok,
        Err(err) => {
            send_join_error(&mut ws_sender, &err).await;
            return;
        },
    };

    let response = ServerMessage::JoinResponse(JoinResponseMsg {
        player_id,
        session_token,
        available_courses: course::COURSES.iter().map(|c| c.to_string()).collect(),
    });
    let Ok(encoded) = encode_server_message(&response) else {
        tracing::warn!("failed to encode join response");
        return;
    };
    if ws_sender.send(Message::Binary(encoded.into())).await.is_err() {
        return;
    }

    {
        let lobby = state.lobby.read().await;
        lobby.broadcast_player_list();
    }

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, player_id).await;

    // Player disconnected — clean up
    let mut lobby = state.lobby.write().await;
    lobby.leave(player_id);
    drop(lobby);

    tracing::info!(player_id, "player disconnected");
}

async fn send_join_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    error: &str,
) {
    let msg = ServerMessage::Error(ErrorMsg {
        message: error.to_string(),
    });
    if let Ok(response) = encode_server_message(&msg)
        && let Err(e) = ws_sender.send(Message::Binary(response.into())).await
    {
        tracing::warn!(error = %e, "failed to send join error response");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(player_id, "rate limited");
            continue;
        }

        // Drop oversized and empty frames
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let message = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(player_id, error = %e, "undecodable message dropped");
                continue;
            },
        };

        match message {
            // A second Join on a live connection is a client bug.
            ClientMessage::Join(_) => {
                tracing::debug!(player_id, "duplicate join ignored");
            },
            ClientMessage::SetReady(m) => {
                let mut lobby = state.lobby.write().await;
                lobby.set_ready(player_id, m.ready);
            },
            ClientMessage::SelectCourse(m) => {
                let mut lobby = state.lobby.write().await;
                if let Err(e) = lobby.select_course(player_id, &m.course) {
                    tracing::debug!(player_id, error = %e, "course rejected");
                }
            },
            // Everything else belongs to the running game.
            other => {
                let mut lobby = state.lobby.write().await;
                lobby.route_action(player_id, other);
            },
        }
    }
}
