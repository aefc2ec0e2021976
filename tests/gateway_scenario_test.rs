//! End-to-end tests: a real server on an ephemeral port, driven over
//! websocket and REST.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use plumb_relay::api::build_app;
use plumb_relay::app_state::AppState;
use plumb_relay::auth::issue_token;
use plumb_relay::config::{DEV_JWT_SECRET, RelayConfig};
use plumb_relay::domain::{ChatId, ChatRecord, Role, UserId, UserRecord};
use plumb_relay::store::{MemoryStore, UserStore};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLIENT_A: UserId = UserId::new(1);
const PLUMBER_B: UserId = UserId::new(2);
const CLIENT_C: UserId = UserId::new(3);
const ADMIN: UserId = UserId::new(9);
const CHAT_42: ChatId = ChatId::new(42);

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    store: Arc<MemoryStore>,
    http: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.seed_user(UserRecord::new(CLIENT_A, "Amal", Role::Client)).await;
        store.seed_user(UserRecord::new(PLUMBER_B, "Basel", Role::Plumber)).await;
        store.seed_user(UserRecord::new(CLIENT_C, "Carim", Role::Client)).await;
        store.seed_user(UserRecord::new(ADMIN, "Root", Role::Admin)).await;
        store
            .seed_chat(ChatRecord {
                id: CHAT_42,
                initiator_id: CLIENT_A,
                recipient_id: PLUMBER_B,
                is_active: true,
                created_at: Utc::now(),
            })
            .await;

        let state = AppState::new(&RelayConfig::default(), Arc::clone(&store));
        let app = build_app(state.clone());
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            store,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn connect(&self, path: &str, user: UserId) -> Result<Ws, tungstenite::Error> {
        let url = format!("ws://{}{path}?token={}", self.addr, token(user));
        connect_async(url).await.map(|(ws, _)| ws)
    }

    async fn open(&self, path: &str, user: UserId) -> Ws {
        let Ok(mut ws) = self.connect(path, user).await else {
            panic!("handshake for {path} failed");
        };
        let welcome = next_json(&mut ws).await;
        assert_eq!(welcome["type"], "connection_established");
        ws
    }

    async fn post(&self, path: &str, user: UserId, body: Value) -> reqwest::Response {
        let Ok(response) = self
            .http
            .post(self.url(path))
            .bearer_auth(token(user))
            .json(&body)
            .send()
            .await
        else {
            panic!("POST {path} failed");
        };
        response
    }

    async fn get(&self, path: &str, user: UserId) -> Value {
        let Ok(response) = self.http.get(self.url(path)).bearer_auth(token(user)).send().await
        else {
            panic!("GET {path} failed");
        };
        assert!(response.status().is_success(), "GET {path}: {}", response.status());
        response.json().await.unwrap_or_else(|e| panic!("GET {path}: {e}"))
    }
}

fn token(user: UserId) -> String {
    issue_token(DEV_JWT_SECRET, user, chrono::Duration::minutes(5))
        .unwrap_or_else(|e| panic!("{e}"))
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(2), ws.next()).await
        else {
            panic!("no frame within 2s");
        };
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap_or_else(|e| panic!("{e}"));
        }
    }
}

async fn next_of_type(ws: &mut Ws, kind: &str) -> Value {
    loop {
        let frame = next_json(ws).await;
        if frame["type"] == kind {
            return frame;
        }
    }
}

async fn send(ws: &mut Ws, text: &str) {
    let result = ws.send(Message::text(text)).await;
    tokio_test::assert_ok!(result);
}

async fn wait_until_no_connections(state: &AppState) {
    for _ in 0..100 {
        if state.registry.connection_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("connections were not cleaned up");
}

fn handshake_status(result: Result<Ws, tungstenite::Error>) -> u16 {
    match result {
        Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("unexpected handshake error: {e}"),
        Ok(_) => panic!("handshake unexpectedly succeeded"),
    }
}

#[tokio::test]
async fn chat_42_hello_reaches_client_a() {
    let server = TestServer::start().await;
    let mut ws_a = server.open("/ws/chat/42", CLIENT_A).await;

    let response = server
        .post("/api/v1/chats/42/messages", PLUMBER_B, json!({"content": "hello"}))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let push = next_json(&mut ws_a).await;
    assert_eq!(push["type"], "chat_message");
    assert_eq!(push["seq"], 1);
    assert_eq!(push["message"]["content"], "hello");
    assert_eq!(push["message"]["chat"], 42);
    assert_eq!(push["message"]["sender"]["id"], 2);

    let notification = next_of_type(&mut ws_a, "notification_message").await;
    assert_eq!(notification["notification"]["notification_type"], "new_message");
}

#[tokio::test]
async fn messages_sent_over_ws_arrive_in_order() {
    let server = TestServer::start().await;
    let mut ws_a = server.open("/ws/chat/42", CLIENT_A).await;
    let mut ws_b = server.open("/ws/chat/42", PLUMBER_B).await;

    send(&mut ws_b, r#"{"type":"chat_message","content":"M1"}"#).await;
    send(&mut ws_b, r#"{"type":"chat_message","content":"M2"}"#).await;

    let first = next_of_type(&mut ws_a, "chat_message").await;
    let second = next_of_type(&mut ws_a, "chat_message").await;
    assert_eq!(first["message"]["content"], "M1");
    assert_eq!(second["message"]["content"], "M2");
    assert!(first["seq"].as_u64() < second["seq"].as_u64());

    let echo = next_of_type(&mut ws_b, "chat_message").await;
    assert_eq!(echo["message"]["content"], "M1");
}

#[tokio::test]
async fn non_participant_is_refused_before_registration() {
    let server = TestServer::start().await;
    assert_eq!(server.state.registry.connection_count().await, 0);

    let status = handshake_status(server.connect("/ws/chat/42", CLIENT_C).await);
    assert_eq!(status, 403);
    assert_eq!(server.state.registry.connection_count().await, 0);
    assert_eq!(server.state.registry.group_count().await, 0);

    let status = handshake_status(server.connect("/ws/chat/999", CLIENT_A).await);
    assert_eq!(status, 404);
}

#[tokio::test]
async fn bad_tokens_are_refused() {
    let server = TestServer::start().await;

    let forged = format!("ws://{}/ws/notifications?token=not-a-jwt", server.addr);
    assert_eq!(handshake_status(connect_async(forged).await.map(|(ws, _)| ws)), 401);

    let missing = format!("ws://{}/ws/notifications", server.addr);
    assert_eq!(handshake_status(connect_async(missing).await.map(|(ws, _)| ws)), 401);

    let Ok(response) = server.http.get(server.url("/api/v1/notifications")).send().await else {
        panic!("request failed");
    };
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut ws = server.open("/ws/notifications", CLIENT_A).await;

    send(&mut ws, "not json").await;
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], 1002);

    send(&mut ws, r#"{"type":"chat_message","content":"hi"}"#).await;
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "error");

    send(&mut ws, r#"{"type":"ping"}"#).await;
    assert_eq!(next_json(&mut ws).await["type"], "pong");
}

#[tokio::test]
async fn storage_failure_over_ws_yields_error_frame() {
    let server = TestServer::start().await;
    let mut ws_a = server.open("/ws/chat/42", CLIENT_A).await;
    let mut ws_b = server.open("/ws/chat/42", PLUMBER_B).await;

    server.store.set_unavailable(true);
    send(&mut ws_b, r#"{"type":"chat_message","content":"lost"}"#).await;
    let error = next_json(&mut ws_b).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], 3001);
    server.store.set_unavailable(false);

    send(&mut ws_b, r#"{"type":"chat_message","content":"kept"}"#).await;
    let push = next_json(&mut ws_a).await;
    assert_eq!(push["message"]["content"], "kept");
}

#[tokio::test]
async fn offline_recipient_reconciles_over_rest() {
    let server = TestServer::start().await;

    let response = server
        .post("/api/v1/chats/42/messages", PLUMBER_B, json!({"content": "are you home?"}))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let listed = server.get("/api/v1/notifications?is_read=false", CLIENT_A).await;
    assert_eq!(listed["pagination"]["total"], 1);
    let id = listed["data"][0]["id"].as_i64().unwrap_or_default();
    assert_eq!(listed["data"][0]["action_url"], "/chat");

    let read = server.get(&format!("/api/v1/notifications/{id}"), CLIENT_A).await;
    assert_eq!(read["is_read"], true);

    let history = server.get("/api/v1/chats/42/messages", CLIENT_A).await;
    assert_eq!(history[0]["content"], "are you home?");

    let stats = server.get("/api/v1/notifications/stats", CLIENT_A).await;
    assert_eq!(stats["total_notifications"], 1);
    assert_eq!(stats["unread_notifications"], 0);
}

#[tokio::test]
async fn mark_read_frame_replies_and_presence_follows_connections() {
    let server = TestServer::start().await;
    let mut ws = server.open("/ws/notifications", CLIENT_A).await;
    let mut second = server.open("/ws/notifications", CLIENT_A).await;

    let response = server
        .post(
            "/api/v1/complaints/7/status",
            ADMIN,
            json!({"owner_id": 1, "old_status": "pending", "new_status": "resolved"}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let push = next_of_type(&mut ws, "notification_message").await;
    assert_eq!(push["notification"]["is_important"], true);
    let id = push["notification"]["id"].as_i64().unwrap_or_default();
    let also = next_of_type(&mut second, "notification_message").await;
    assert_eq!(also["notification"]["id"], id);

    send(&mut ws, &json!({"type": "mark_read", "notification_id": id}).to_string()).await;
    let reply = next_of_type(&mut ws, "notification_read").await;
    assert_eq!(reply["notification"]["is_read"], true);

    let online = |store: Arc<MemoryStore>| async move {
        store
            .get_user(CLIENT_A)
            .await
            .ok()
            .flatten()
            .is_some_and(|u| u.is_online)
    };
    assert!(online(Arc::clone(&server.store)).await);

    let _ = ws.close(None).await;
    drop(ws);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(online(Arc::clone(&server.store)).await, "second tab still open");

    let _ = second.close(None).await;
    drop(second);
    wait_until_no_connections(&server.state).await;
    for _ in 0..100 {
        if !online(Arc::clone(&server.store)).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("user stayed online after the last connection closed");
}

#[tokio::test]
async fn service_request_reaches_plumber_who_can_dismiss_it() {
    let server = TestServer::start().await;
    let mut ws = server.open("/ws/notifications", PLUMBER_B).await;

    let response = server
        .post("/api/v1/services/5/requested", CLIENT_A, json!({"plumber_id": 2}))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let push = next_of_type(&mut ws, "notification_message").await;
    assert_eq!(push["notification"]["notification_type"], "service_update");
    assert_eq!(push["notification"]["is_important"], true);
    assert_eq!(push["notification"]["action_url"], "/services/5");
    let id = push["notification"]["id"].as_i64().unwrap_or_default();

    let delete = |user: UserId| {
        server
            .http
            .delete(server.url(&format!("/api/v1/notifications/{id}")))
            .bearer_auth(token(user))
            .send()
    };
    let Ok(foreign) = delete(CLIENT_A).await else {
        panic!("DELETE failed");
    };
    assert_eq!(foreign.status().as_u16(), 404);
    let Ok(own) = delete(PLUMBER_B).await else {
        panic!("DELETE failed");
    };
    assert_eq!(own.status().as_u16(), 204);

    let listed = server.get("/api/v1/notifications", PLUMBER_B).await;
    assert_eq!(listed["pagination"]["total"], 0);

    let bad_rating = server
        .post(
            "/api/v1/services/5/reviewed",
            CLIENT_A,
            json!({"plumber_id": 2, "rating": 9}),
        )
        .await;
    assert_eq!(bad_rating.status().as_u16(), 400);
}
