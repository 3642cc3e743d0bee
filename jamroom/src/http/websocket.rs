//! WebSocket transport with JSON text frames
//!
//! The handler authenticates the connection before upgrading, then hands
//! the socket to `SessionController::run` through the [`StreamMessage`]
//! adapter below.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use jamroom_core::models::Identity;
use jamroom_core::service::extract_bearer_token;
use jamroom_sync::{
    ClientEvent, Incoming, ServerEvent, SessionController, StreamError, StreamMessage,
};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use super::{AppError, AppState};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Access token, for clients that cannot set headers on the upgrade request
    pub token: Option<String>,
}

/// Result of decoding one WebSocket frame
#[derive(Debug, PartialEq)]
enum Frame {
    Event(Result<ClientEvent, StreamError>),
    /// Proof the peer is alive; pings are answered by the protocol layer
    Keepalive,
    Closed,
}

fn decode_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Event(
            ClientEvent::decode(text.as_str()).map_err(|e| StreamError::Decode(e.to_string())),
        ),
        Message::Binary(_) => Frame::Event(Err(StreamError::Decode(
            "binary frames are not supported, send JSON text".to_string(),
        ))),
        Message::Close(_) => Frame::Closed,
        Message::Ping(_) | Message::Pong(_) => Frame::Keepalive,
    }
}

/// WebSocket implementation of the `StreamMessage` trait
struct WebSocketStream {
    receiver: SplitStream<WebSocket>,
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl StreamMessage for WebSocketStream {
    async fn recv(&mut self) -> Option<Result<Incoming, StreamError>> {
        match self.receiver.next().await? {
            Ok(message) => match decode_frame(message) {
                Frame::Event(event) => Some(event.map(Incoming::Event)),
                Frame::Keepalive => Some(Ok(Incoming::Keepalive)),
                Frame::Closed => None,
            },
            Err(e) => Some(Err(StreamError::Transport(format!("WebSocket error: {e}")))),
        }
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<(), StreamError> {
        let text = event
            .encode()
            .map_err(|e| StreamError::Transport(format!("Failed to encode event: {e}")))?;
        self.sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| StreamError::Transport(format!("WebSocket error: {e}")))
    }

    async fn ping(&mut self) -> Result<(), StreamError> {
        self.sender
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| StreamError::Transport(format!("WebSocket error: {e}")))
    }
}

/// Resolve the connection's identity from `?token=` or a bearer header
pub(crate) async fn authenticate(
    state: &AppState,
    query_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<Identity, AppError> {
    let token = match query_token.filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => {
            let value = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::unauthorized("Missing access token"))?;
            extract_bearer_token(value)?
        }
    };

    state
        .verifier
        .verify(token)
        .await
        .map_err(|e| AppError::unauthorized(format!("Invalid token: {e}")))
}

/// WebSocket handler for the listening room protocol
///
/// Clients connect to `ws://host/ws?token={jwt}` or send
/// `Authorization: Bearer {jwt}` on the upgrade request.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let identity = authenticate(&state, query.token.as_deref(), &headers).await?;

    // Register before upgrading so connection limits surface as HTTP errors.
    // If the upgrade never completes, dropping the session unregisters it.
    let (session, outbound) = state.coordinator.connect(identity)?;

    Ok(ws
        .max_message_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, session, outbound)))
}

async fn handle_socket(
    socket: WebSocket,
    session: SessionController,
    outbound: UnboundedReceiver<ServerEvent>,
) {
    info!(
        user_id = %session.user_id(),
        connection_id = %session.connection_id(),
        tier = %session.identity().account_tier,
        "WebSocket connection established"
    );

    let (sender, receiver) = socket.split();
    let mut stream = WebSocketStream { receiver, sender };

    session.run(&mut stream, outbound).await;

    debug!(connection_id = %session.connection_id(), "WebSocket stream finished");
    info!(
        user_id = %session.user_id(),
        connection_id = %session.connection_id(),
        "WebSocket connection closed"
    );
}
