use std::collections::HashMap;
use std::sync::Arc;

use domain::{Channel, ChatMessage, DomainError, ParticipantPair};
use uuid::Uuid;

use crate::{
    broadcaster::{MessageBroadcast, MessageBroadcaster},
    clock::Clock,
    error::ApplicationError,
    repository::{ChannelRepository, MessageRepository},
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub body: String,
    /// 经由 WebSocket 发送时的来源连接；实时投递会跳过它
    pub origin_connection: Option<Uuid>,
}

pub struct ChatServiceDependencies {
    pub channel_repository: Arc<dyn ChannelRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
}

/// 会话与消息服务
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 解析两个参与者之间的会话，不存在则创建。
    /// 参与者顺序无关，并发首次接触也只会得到一个会话。
    pub async fn resolve_channel(
        &self,
        party_a: Uuid,
        party_b: Uuid,
    ) -> Result<Channel, ApplicationError> {
        let pair = ParticipantPair::new(party_a, party_b)?;
        let candidate = Channel::between(Uuid::new_v4(), pair, self.deps.clock.now());
        self.deps
            .channel_repository
            .get_or_create(candidate)
            .await
            .map_err(ApplicationError::from)
    }

    pub async fn channel(&self, channel_id: Uuid) -> Result<Channel, ApplicationError> {
        self.deps
            .channel_repository
            .find_by_id(channel_id)
            .await?
            .ok_or_else(|| DomainError::ChannelNotFound.into())
    }

    pub async fn channels_for(&self, party: Uuid) -> Result<Vec<Channel>, ApplicationError> {
        Ok(self
            .deps
            .channel_repository
            .list_for_participant(party)
            .await?)
    }

    /// 发送消息：先持久化，再尽力而为地实时投递。
    /// 投递失败只记日志，绝不让已持久化的发送失败；
    /// 客户端通过重新拉取 history 对账。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<ChatMessage, ApplicationError> {
        self.channel(request.channel_id).await?;

        let message = ChatMessage::new(
            Uuid::new_v4(),
            request.channel_id,
            request.sender_id,
            request.receiver_id,
            request.body,
            self.deps.clock.now(),
        )?;

        let stored = self.deps.message_repository.append(message).await?;

        if let Err(broadcast_error) = self
            .deps
            .broadcaster
            .broadcast(MessageBroadcast::chat(
                request.channel_id,
                stored.clone(),
                request.origin_connection,
            ))
            .await
        {
            tracing::warn!(
                channel_id = %request.channel_id,
                message_id = %stored.id,
                error = %broadcast_error,
                "message persisted but live relay failed"
            );
        }

        Ok(stored)
    }

    /// 会话历史，按创建时间升序
    pub async fn history(&self, channel_id: Uuid) -> Result<Vec<ChatMessage>, ApplicationError> {
        self.channel(channel_id).await?;
        Ok(self.deps.message_repository.history(channel_id).await?)
    }

    /// 收件箱：该参与者发出的消息按会话归并，每个会话保留时间戳最大的
    /// 一条。时间戳相同（秒级精度下会发生）时保留归并过程中后出现的
    /// 那条。结果按时间倒序排列。
    pub async fn inbox(&self, party: Uuid) -> Result<Vec<ChatMessage>, ApplicationError> {
        let messages = self.deps.message_repository.list_by_sender(party).await?;

        let mut latest: HashMap<Uuid, ChatMessage> = HashMap::new();
        for message in messages {
            match latest.get(&message.channel_id) {
                Some(existing) if existing.created_at > message.created_at => {}
                _ => {
                    latest.insert(message.channel_id, message);
                }
            }
        }

        let mut entries: Vec<ChatMessage> = latest.into_values().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use crate::memory::InMemoryChatStore;

    /// 模拟完全不可用的广播器
    struct FailingBroadcaster;

    #[async_trait]
    impl MessageBroadcaster for FailingBroadcaster {
        async fn broadcast(
            &self,
            _payload: MessageBroadcast,
        ) -> Result<usize, crate::broadcaster::BroadcastError> {
            Err(crate::broadcaster::BroadcastError::failed("hub offline"))
        }
    }

    struct NullBroadcaster;

    #[async_trait]
    impl MessageBroadcaster for NullBroadcaster {
        async fn broadcast(
            &self,
            _payload: MessageBroadcast,
        ) -> Result<usize, crate::broadcaster::BroadcastError> {
            Ok(0)
        }
    }

    fn service_with(broadcaster: Arc<dyn MessageBroadcaster>) -> ChatService {
        let store = Arc::new(InMemoryChatStore::new());
        ChatService::new(ChatServiceDependencies {
            channel_repository: store.clone(),
            message_repository: store,
            clock: Arc::new(SystemClock),
            broadcaster,
        })
    }

    #[tokio::test]
    async fn resolve_is_order_independent_and_idempotent() {
        let service = service_with(Arc::new(NullBroadcaster));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = service.resolve_channel(a, b).await.unwrap();
        let second = service.resolve_channel(b, a).await.unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn concurrent_resolve_converges_to_one_channel() {
        let service = Arc::new(service_with(Arc::new(NullBroadcaster)));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (r1, r2, r3, r4) = tokio::join!(
            service.resolve_channel(a, b),
            service.resolve_channel(b, a),
            service.resolve_channel(a, b),
            service.resolve_channel(b, a)
        );

        let ids = [
            r1.unwrap().id,
            r2.unwrap().id,
            r3.unwrap().id,
            r4.unwrap().id,
        ];
        assert!(ids.iter().all(|id| *id == ids[0]));

        let channels = service.channels_for(a).await.unwrap();
        assert_eq!(channels.len(), 1);
    }

    #[tokio::test]
    async fn resolve_with_self_is_rejected() {
        let service = service_with(Arc::new(NullBroadcaster));
        let a = Uuid::new_v4();
        assert!(service.resolve_channel(a, a).await.is_err());
    }

    #[tokio::test]
    async fn send_persists_even_when_relay_fails() {
        let service = service_with(Arc::new(FailingBroadcaster));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let channel = service.resolve_channel(a, b).await.unwrap();

        let stored = service
            .send_message(SendMessageRequest {
                channel_id: channel.id,
                sender_id: a,
                receiver_id: Some(b),
                body: "hello".to_string(),
                origin_connection: None,
            })
            .await
            .unwrap();

        let history = service.history(channel.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, stored.id);
    }

    #[tokio::test]
    async fn send_to_unknown_channel_is_rejected() {
        let service = service_with(Arc::new(NullBroadcaster));
        let err = service
            .send_message(SendMessageRequest {
                channel_id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                receiver_id: None,
                body: "hello".to_string(),
                origin_connection: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::ChannelNotFound)
        ));
    }

    #[tokio::test]
    async fn history_preserves_append_order() {
        let service = service_with(Arc::new(NullBroadcaster));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let channel = service.resolve_channel(a, b).await.unwrap();

        for i in 0..5 {
            service
                .send_message(SendMessageRequest {
                    channel_id: channel.id,
                    sender_id: a,
                    receiver_id: Some(b),
                    body: format!("message {i}"),
                    origin_connection: None,
                })
                .await
                .unwrap();
        }

        let history = service.history(channel.id).await.unwrap();
        assert_eq!(history.len(), 5);
        for (i, message) in history.iter().enumerate() {
            assert_eq!(message.body, format!("message {i}"));
        }
        assert!(history
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[tokio::test]
    async fn inbox_keeps_latest_message_per_channel_with_tie_break() {
        let store = Arc::new(InMemoryChatStore::new());
        let service = ChatService::new(ChatServiceDependencies {
            channel_repository: store.clone(),
            message_repository: store.clone(),
            clock: Arc::new(SystemClock),
            broadcaster: Arc::new(NullBroadcaster),
        });

        let sender = Uuid::new_v4();
        let peer_1 = Uuid::new_v4();
        let peer_2 = Uuid::new_v4();
        let channel_1 = service.resolve_channel(sender, peer_1).await.unwrap();
        let channel_2 = service.resolve_channel(sender, peer_2).await.unwrap();

        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        // 直接写入存储以便控制秒级时间戳
        for (channel_id, body, at) in [
            (channel_1.id, "old", base),
            (channel_1.id, "tie-first", base + Duration::seconds(10)),
            (channel_1.id, "tie-last", base + Duration::seconds(10)),
            (channel_2.id, "solo", base + Duration::seconds(5)),
        ] {
            store
                .append(
                    ChatMessage::new(Uuid::new_v4(), channel_id, sender, None, body, at).unwrap(),
                )
                .await
                .unwrap();
        }

        let inbox = service.inbox(sender).await.unwrap();
        assert_eq!(inbox.len(), 2);

        // 倒序：channel_1 的最新消息在前，时间戳并列时保留后出现的一条
        assert_eq!(inbox[0].channel_id, channel_1.id);
        assert_eq!(inbox[0].body, "tie-last");
        assert_eq!(inbox[1].channel_id, channel_2.id);
        assert_eq!(inbox[1].body, "solo");
    }

    #[tokio::test]
    async fn history_of_unknown_channel_is_not_found() {
        let service = service_with(Arc::new(NullBroadcaster));
        let err = service.history(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::ChannelNotFound)
        ));
        // 存在但为空的会话返回空序列而不是错误
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let channel = service.resolve_channel(a, b).await.unwrap();
        assert!(service.history(channel.id).await.unwrap().is_empty());
    }
}
