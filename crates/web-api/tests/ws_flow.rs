mod support;

use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite};

use support::{connect, join, next_close, next_json, send_json, spawn_server};

#[tokio::test]
async fn create_room_returns_unique_id() {
    let server = spawn_server().await;
    let client = Client::new();

    let first = client
        .post(server.http("/api/room"))
        .send()
        .await
        .expect("create room")
        .text()
        .await
        .expect("room id");
    let second = client
        .post(server.http("/api/room"))
        .send()
        .await
        .expect("create room")
        .text()
        .await
        .expect("room id");

    assert_eq!(first.len(), 64);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(first, second);
}

#[tokio::test]
async fn chat_flow_between_two_clients() {
    let server = spawn_server().await;

    let (mut alice, frames) = join(&server, "lobby", "alice").await;
    assert_eq!(frames, vec![json!({"joined": "alice"}), json!({"ready": true})]);

    let (mut bob, frames) = join(&server, "lobby", "bob").await;
    assert_eq!(
        frames,
        vec![
            json!({"joined": "alice"}),
            json!({"joined": "bob"}),
            json!({"ready": true})
        ]
    );
    assert_eq!(next_json(&mut alice).await, json!({"joined": "bob"}));

    send_json(&mut alice, json!({"message": "hello bob"})).await;
    for ws in [&mut alice, &mut bob] {
        let chat = next_json(ws).await;
        assert_eq!(chat["name"], "alice");
        assert_eq!(chat["message"], "hello bob");
        assert!(chat["timestamp"].as_i64().unwrap() > 0);
    }

    bob.close(None).await.expect("close bob");
    assert_eq!(next_json(&mut alice).await, json!({"quit": "bob"}));
}

#[tokio::test]
async fn late_joiner_receives_history_before_ready() {
    let server = spawn_server().await;

    let (mut alice, _) = join(&server, "history", "alice").await;
    send_json(&mut alice, json!({"message": "first!"})).await;
    assert_eq!(next_json(&mut alice).await["message"], "first!");

    let (_carol, frames) = join(&server, "history", "carol").await;
    assert_eq!(frames[0], json!({"joined": "alice"}));
    assert_eq!(frames[1]["message"], "first!");
    assert_eq!(frames[2], json!({"joined": "carol"}));
    assert_eq!(frames[3], json!({"ready": true}));
}

#[tokio::test]
async fn oversized_name_closes_with_policy_violation() {
    let server = spawn_server().await;
    let mut ws = connect(&server, "lobby").await;

    send_json(&mut ws, json!({"name": "n".repeat(33)})).await;

    assert_eq!(next_json(&mut ws).await, json!({"error": "Name too long."}));
    let frame = next_close(&mut ws).await.expect("close frame");
    assert_eq!(u16::from(frame.code), 1008);
}

#[tokio::test]
async fn invalid_message_keeps_connection_open() {
    let server = spawn_server().await;
    let (mut ws, _) = join(&server, "lobby", "dave").await;

    send_json(&mut ws, json!({"message": "x".repeat(257)})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"error": "Message too long (max 256 characters)."})
    );

    send_json(&mut ws, json!({"message": "fits"})).await;
    assert_eq!(next_json(&mut ws).await["message"], "fits");
}

#[tokio::test]
async fn unknown_room_name_is_rejected() {
    let server = spawn_server().await;
    let url = server.ws(&format!("/api/room/{}/websocket", "r".repeat(40)));

    match connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 404)
        }
        other => panic!("expected http rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn limiter_service_endpoints() {
    let server = spawn_server().await;
    let client = Client::new();
    let check = server.http("/limiters/198.51.100.20/check");

    let first: f64 = client
        .post(&check)
        .send()
        .await
        .expect("check")
        .text()
        .await
        .expect("body")
        .parse()
        .expect("seconds");
    assert_eq!(first, 0.0);

    for _ in 0..5 {
        client.post(&check).send().await.expect("check");
    }
    let peeked: f64 = client
        .get(&check)
        .send()
        .await
        .expect("peek")
        .text()
        .await
        .expect("body")
        .parse()
        .expect("seconds");
    assert!(peeked > 0.0);

    for action in ["config", "stats", "reset"] {
        let response = client
            .post(server.http(&format!("/limiters/198.51.100.20/{action}")))
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}

#[tokio::test]
async fn health_check() {
    let server = spawn_server().await;
    let body = Client::new()
        .get(server.http("/health"))
        .send()
        .await
        .expect("health")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "ok");
}
