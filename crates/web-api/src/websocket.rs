//! WebSocket 处理器
//!
//! 连接建立后客户端通过 join 帧加入会话、send 帧发送消息。
//! 消息持久化与实时投递互相独立：send 帧先经消息存储落盘，
//! 再由连接中枢转发给会话内其它连接（跳过来源连接本身）。

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use application::{MessageDto, SendMessageRequest};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// 连接方的参与者标识（认证由外部层完成）
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Join {
        channel_id: Uuid,
    },
    Send {
        channel_id: Uuid,
        body: String,
        receiver_id: Option<Uuid>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Joined { channel_id: Uuid },
    Message { message: MessageDto },
    Error { message: String },
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, state: AppState) {
    let (connection_id, mut relay_rx) = state.hub.register(user_id).await;
    let (mut sink, mut stream) = socket.split();

    // 回执与转发走同一个发送任务，避免两处同时写 socket
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerFrame>(16);

    let send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                broadcast = relay_rx.recv() => match broadcast {
                    Some(broadcast) => ServerFrame::Message {
                        message: broadcast.message.into(),
                    },
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(error = %err, "failed to encode server frame");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            WsMessage::Text(text) => {
                let reply = match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => handle_client_frame(&state, connection_id, user_id, frame).await,
                    Err(_) => Some(ServerFrame::Error {
                        message: "invalid frame".to_string(),
                    }),
                };
                if let Some(reply) = reply {
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            WsMessage::Close(_) => break,
            // ping/pong 由协议层处理
            _ => {}
        }
    }

    state.hub.unregister(connection_id).await;
    send_task.abort();
    tracing::debug!(%connection_id, %user_id, "websocket session ended");
}

async fn handle_client_frame(
    state: &AppState,
    connection_id: Uuid,
    user_id: Uuid,
    frame: ClientFrame,
) -> Option<ServerFrame> {
    match frame {
        ClientFrame::Join { channel_id } => {
            if let Err(err) = state.chat_service.channel(channel_id).await {
                return Some(ServerFrame::Error {
                    message: err.to_string(),
                });
            }
            state.hub.join(connection_id, channel_id).await;
            Some(ServerFrame::Joined { channel_id })
        }
        ClientFrame::Send {
            channel_id,
            body,
            receiver_id,
        } => {
            let result = state
                .chat_service
                .send_message(SendMessageRequest {
                    channel_id,
                    sender_id: user_id,
                    receiver_id,
                    body,
                    origin_connection: Some(connection_id),
                })
                .await;

            match result {
                Ok(_) => None,
                Err(err) => Some(ServerFrame::Error {
                    message: err.to_string(),
                }),
            }
        }
    }
}
