use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use gridrally_core::events::GameEvent;
use gridrally_core::net::messages::{ClientMessage, JoinMsg, JoinResponseMsg, ServerMessage};
use gridrally_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};

use gridrally_server::build_app;
use gridrally_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        let mut config = ServerConfig::default();
        // Keep the tests snappy.
        config.rules.animation_pause_ms_per_player = 0;
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read the next binary frame, skipping control frames.
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, stream.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream closed")
            .expect("websocket error");
        if let Message::Binary(data) = msg {
            return data.to_vec();
        }
    }
}

pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).expect("decode server message")
}

/// Send a Join and return the decoded JoinResponse.
pub async fn ws_join(stream: &mut WsStream, name: &str) -> JoinResponseMsg {
    ws_send(
        stream,
        &ClientMessage::Join(JoinMsg {
            player_name: name.to_string(),
            figure: 0,
            is_bot: false,
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;
    match ws_read_server_msg(stream).await {
        ServerMessage::JoinResponse(resp) => resp,
        other => panic!("expected JoinResponse, got: {other:?}"),
    }
}

/// Discard frames until an event batch arrives, then return it.
pub async fn ws_wait_for_events(stream: &mut WsStream) -> Vec<GameEvent> {
    for _ in 0..32 {
        if let ServerMessage::Event(batch) = ws_read_server_msg(stream).await {
            return batch.events;
        }
    }
    panic!("no event batch within 32 frames");
}
