//! 实时连接中枢
//!
//! 维护活跃连接与其加入的会话，把消息转发给会话内除来源之外的
//! 所有连接。投递是尽力而为的：每个连接有自己的有界发送队列，
//! 队列已满或连接已断开时跳过该连接，不影响其它成员。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use application::broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster};

/// 单连接发送队列容量
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub connection_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            connection_buffer: 64,
        }
    }
}

struct ConnectionHandle {
    user_id: Uuid,
    sender: mpsc::Sender<MessageBroadcast>,
    joined: HashSet<Uuid>,
}

pub struct ChannelHub {
    config: HubConfig,
    connections: RwLock<HashMap<Uuid, ConnectionHandle>>,
    /// 会话 -> 已加入的连接集合
    members: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl ChannelHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            connections: RwLock::new(HashMap::new()),
            members: RwLock::new(HashMap::new()),
        }
    }

    /// 注册一个活跃连接，返回连接标识与它的接收端
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::Receiver<MessageBroadcast>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.config.connection_buffer);

        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id,
            ConnectionHandle {
                user_id,
                sender,
                joined: HashSet::new(),
            },
        );
        tracing::debug!(%connection_id, %user_id, "connection registered");

        (connection_id, receiver)
    }

    /// 把连接加入会话；重复加入是幂等的。连接不存在时返回 false。
    pub async fn join(&self, connection_id: Uuid, channel_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        let Some(handle) = connections.get_mut(&connection_id) else {
            return false;
        };
        if !handle.joined.insert(channel_id) {
            return true;
        }

        let mut members = self.members.write().await;
        members.entry(channel_id).or_default().insert(connection_id);
        tracing::debug!(%connection_id, %channel_id, "connection joined channel");
        true
    }

    /// 断开连接：从所有已加入的会话中移除
    pub async fn unregister(&self, connection_id: Uuid) {
        let handle = {
            let mut connections = self.connections.write().await;
            connections.remove(&connection_id)
        };
        let Some(handle) = handle else {
            return;
        };

        let mut members = self.members.write().await;
        for channel_id in &handle.joined {
            if let Some(set) = members.get_mut(channel_id) {
                set.remove(&connection_id);
                if set.is_empty() {
                    members.remove(channel_id);
                }
            }
        }
        tracing::debug!(%connection_id, user_id = %handle.user_id, "connection unregistered");
    }

    /// 向会话内除来源连接外的所有成员投递，返回实际送达的连接数
    ///
    /// 锁的获取顺序固定为 connections -> members，与 join/unregister 一致。
    pub async fn relay(&self, payload: MessageBroadcast) -> usize {
        let connections = self.connections.read().await;
        let member_ids: Vec<Uuid> = {
            let members = self.members.read().await;
            match members.get(&payload.channel_id) {
                Some(set) => set.iter().copied().collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for connection_id in member_ids {
            if payload.origin == Some(connection_id) {
                continue;
            }
            let Some(handle) = connections.get(&connection_id) else {
                continue;
            };
            match handle.sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        %connection_id,
                        channel_id = %payload.channel_id,
                        "send queue full, skipping slow connection"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(
                        %connection_id,
                        channel_id = %payload.channel_id,
                        "connection already closed, skipping"
                    );
                }
            }
        }
        delivered
    }
}

#[async_trait]
impl MessageBroadcaster for ChannelHub {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<usize, BroadcastError> {
        Ok(self.relay(payload).await)
    }
}
