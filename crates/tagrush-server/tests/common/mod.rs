use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tagrush_core::net::messages::{
    ClientMessage, CreateRoomMsg, JoinRoomMsg, RoomJoinedMsg, ServerMessage, StartGameMsg,
};
use tagrush_core::net::protocol::{decode_server_message, encode_client_message};

use tagrush_server::build_app_with;
use tagrush_server::config::ServerConfig;
use tagrush_sim::arena::ArenaCatalog;
use tagrush_sim::config::TagConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default limits and no results delay.
    pub async fn new() -> Self {
        let mut config = ServerConfig::default();
        config.rooms.results_delay_secs = 0;
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app_with(config, ArenaCatalog::builtin(), TagConfig::default());

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

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
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

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Send arbitrary bytes as one binary frame.
pub async fn ws_send_raw(stream: &mut WsStream, data: Vec<u8>) {
    stream.send(Message::Binary(data.into())).await.unwrap();
}

/// Create a room with default settings. Returns the RoomJoined reply.
pub async fn ws_create_room(stream: &mut WsStream, name: &str) -> RoomJoinedMsg {
    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        player_name: name.to_string(),
        arena_index: None,
        round_duration_secs: None,
    });
    ws_send_client_msg(stream, &msg).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::RoomJoined(joined) => joined,
        other => panic!("Expected RoomJoined, got: {other:?}"),
    }
}

/// Send a JoinRoom and return whatever the server replies.
pub async fn ws_join_room_raw(stream: &mut WsStream, room_code: &str, name: &str) -> ServerMessage {
    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_code: room_code.to_string(),
        player_name: name.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
    ws_read_server_msg(stream).await
}

/// Join an existing room, expecting success.
pub async fn ws_join_room(stream: &mut WsStream, room_code: &str, name: &str) -> RoomJoinedMsg {
    match ws_join_room_raw(stream, room_code, name).await {
        ServerMessage::RoomJoined(joined) => joined,
        other => panic!("Expected RoomJoined, got: {other:?}"),
    }
}

/// Join an existing room, expecting an error reply. Returns its text.
pub async fn ws_join_room_expect_error(stream: &mut WsStream, room_code: &str, name: &str) -> String {
    match ws_join_room_raw(stream, room_code, name).await {
        ServerMessage::Error(e) => e.message,
        other => panic!("Expected Error, got: {other:?}"),
    }
}

pub async fn ws_start_game(stream: &mut WsStream) {
    ws_send_client_msg(stream, &ClientMessage::StartGame(StartGameMsg {})).await;
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Skip messages until one matches `pred` (10s overall timeout).
pub async fn ws_read_until<F: Fn(&ServerMessage) -> bool>(
    stream: &mut WsStream,
    pred: F,
) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let msg = ws_read_server_msg(stream).await;
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("Timed out waiting for matching message")
}

/// Connect two players into one room. Returns (host, guest, room code).
pub async fn two_player_room(server: &TestServer) -> (WsStream, WsStream, String) {
    let mut host = ws_connect(&server.ws_url()).await;
    let code = ws_create_room(&mut host, "Alice").await.room.code;
    let mut guest = ws_connect(&server.ws_url()).await;
    ws_join_room(&mut guest, &code, "Bob").await;
    // Host hears about the join.
    match ws_read_server_msg(&mut host).await {
        ServerMessage::PlayerJoined(_) => {},
        other => panic!("Expected PlayerJoined, got: {other:?}"),
    }
    (host, guest, code)
}
