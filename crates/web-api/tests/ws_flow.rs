mod support;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::json;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as TungsteniteMessage};
use uuid::Uuid;

use support::spawn_app;

async fn next_json(
    ws: &mut (impl StreamExt<Item = Result<TungsteniteMessage, tokio_tungstenite::tungstenite::Error>>
          + Unpin),
) -> serde_json::Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame timeout")
            .expect("stream ended")
            .expect("frame error");
        if let TungsteniteMessage::Text(payload) = frame {
            return serde_json::from_str(&payload).expect("frame json");
        }
    }
}

#[tokio::test]
async fn websocket_chat_between_two_participants() {
    let (addr, shutdown) = spawn_app().await;
    let base = format!("http://{}/api/v1", addr);
    let client = Client::new();

    let x = Uuid::new_v4();
    let y = Uuid::new_v4();

    // 双方各自解析会话，得到同一个 id
    let channel: serde_json::Value = client
        .post(format!("{base}/channels/resolve"))
        .json(&json!({ "party_a": x, "party_b": y }))
        .send()
        .await
        .expect("resolve")
        .json()
        .await
        .expect("resolve json");
    let channel_id = channel["id"].as_str().unwrap().parse::<Uuid>().unwrap();

    let (mut ws_x, _) = connect_async(format!("ws://{}/api/v1/ws?user_id={}", addr, x))
        .await
        .expect("ws x connect");
    let (mut ws_y, _) = connect_async(format!("ws://{}/api/v1/ws?user_id={}", addr, y))
        .await
        .expect("ws y connect");

    // 双方加入会话并等待确认
    for ws in [&mut ws_x, &mut ws_y] {
        ws.send(TungsteniteMessage::Text(
            json!({ "type": "join", "channel_id": channel_id }).to_string().into(),
        ))
        .await
        .expect("join");
    }
    assert_eq!(next_json(&mut ws_x).await["type"], "joined");
    assert_eq!(next_json(&mut ws_y).await["type"], "joined");

    // X 发送，Y 实时收到
    ws_x.send(TungsteniteMessage::Text(
        json!({
            "type": "send",
            "channel_id": channel_id,
            "body": "hello",
            "receiver_id": y
        })
        .to_string()
        .into(),
    ))
    .await
    .expect("send");

    let received = next_json(&mut ws_y).await;
    assert_eq!(received["type"], "message");
    assert_eq!(received["message"]["body"], "hello");
    assert_eq!(received["message"]["sender_id"], x.to_string());

    // 来源连接自身不会收到转发
    let echo = timeout(Duration::from_millis(300), ws_x.next()).await;
    assert!(echo.is_err(), "origin connection must not receive its own message");

    // 历史中恰好出现一次
    let history: Vec<serde_json::Value> = client
        .get(format!("{base}/channels/{channel_id}/messages"))
        .send()
        .await
        .expect("history")
        .json()
        .await
        .expect("history json");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["body"], "hello");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn websocket_join_unknown_channel_reports_error() {
    let (addr, shutdown) = spawn_app().await;

    let (mut ws, _) = connect_async(format!(
        "ws://{}/api/v1/ws?user_id={}",
        addr,
        Uuid::new_v4()
    ))
    .await
    .expect("ws connect");

    ws.send(TungsteniteMessage::Text(
        json!({ "type": "join", "channel_id": Uuid::new_v4() })
            .to_string()
            .into(),
    ))
    .await
    .expect("join");

    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn websocket_send_persists_and_relays_to_late_reader() {
    let (addr, shutdown) = spawn_app().await;
    let base = format!("http://{}/api/v1", addr);
    let client = Client::new();

    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    let channel: serde_json::Value = client
        .post(format!("{base}/channels/resolve"))
        .json(&json!({ "party_a": x, "party_b": y }))
        .send()
        .await
        .expect("resolve")
        .json()
        .await
        .expect("resolve json");
    let channel_id = channel["id"].as_str().unwrap().parse::<Uuid>().unwrap();

    // 对端不在线时发送：无人接收转发，但消息必须已持久化
    let (mut ws_x, _) = connect_async(format!("ws://{}/api/v1/ws?user_id={}", addr, x))
        .await
        .expect("ws x connect");
    ws_x.send(TungsteniteMessage::Text(
        json!({ "type": "join", "channel_id": channel_id }).to_string().into(),
    ))
    .await
    .expect("join");
    assert_eq!(next_json(&mut ws_x).await["type"], "joined");

    ws_x.send(TungsteniteMessage::Text(
        json!({ "type": "send", "channel_id": channel_id, "body": "are you there?" })
            .to_string()
            .into(),
    ))
    .await
    .expect("send");

    // Y 上线后通过 history 对账
    let mut last = Vec::new();
    for _ in 0..50 {
        last = client
            .get(format!("{base}/channels/{channel_id}/messages"))
            .send()
            .await
            .expect("history")
            .json::<Vec<serde_json::Value>>()
            .await
            .expect("history json");
        if !last.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last.len(), 1);
    assert_eq!(last[0]["body"], "are you there?");

    let _ = shutdown.send(());
}
