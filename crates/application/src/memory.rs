//! 内存存储实现
//!
//! 用于测试与本地运行。原子性保证与 Postgres 实现一致：
//! 条件状态转换和会话查找-创建都在单个写锁临界区内完成。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{ChannelRepository, ListingRepository, MessageRepository};
use domain::{Channel, ChatMessage, Listing, ParticipantPair, RepositoryError, StatusTransition};

#[derive(Default)]
pub struct InMemoryListingRepository {
    rows: RwLock<HashMap<Uuid, Listing>>,
}

impl InMemoryListingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    async fn create(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&listing.id) {
            return Err(RepositoryError::Conflict);
        }
        rows.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn list_by_holder(&self, holder_id: Uuid) -> Result<Vec<Listing>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|listing| listing.holder_id == holder_id)
            .cloned()
            .collect())
    }

    async fn apply(
        &self,
        id: Uuid,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Listing, RepositoryError> {
        // 检查与写入在同一个写锁临界区内，等价于存储层的条件更新
        let mut rows = self.rows.write().await;
        let listing = rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        listing
            .apply_transition(transition, now)
            .map_err(|_| RepositoryError::Conflict)?;
        Ok(listing.clone())
    }

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.write().await;
        let listing = rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if listing.notified_at.is_some() {
            return Ok(false);
        }
        listing.mark_notified(at);
        Ok(true)
    }
}

#[derive(Default)]
struct ChatState {
    channels: HashMap<Uuid, Channel>,
    by_pair: HashMap<ParticipantPair, Uuid>,
    messages: Vec<ChatMessage>,
}

/// 会话与消息的共享内存存储。
/// 两者放在同一把锁下，使「会话存在性检查 + 消息追加」保持一致。
#[derive(Default)]
pub struct InMemoryChatStore {
    state: RwLock<ChatState>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChatStore {
    async fn get_or_create(&self, candidate: Channel) -> Result<Channel, RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(existing_id) = state.by_pair.get(&candidate.pair) {
            let existing = state
                .channels
                .get(existing_id)
                .cloned()
                .ok_or_else(|| RepositoryError::storage("pair index out of sync"))?;
            return Ok(existing);
        }
        state.by_pair.insert(candidate.pair, candidate.id);
        state.channels.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Channel>, RepositoryError> {
        Ok(self.state.read().await.channels.get(&id).cloned())
    }

    async fn list_for_participant(&self, party: Uuid) -> Result<Vec<Channel>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .channels
            .values()
            .filter(|channel| channel.involves(party))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageRepository for InMemoryChatStore {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.channels.contains_key(&message.channel_id) {
            return Err(RepositoryError::NotFound);
        }
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn history(&self, channel_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|message| message.channel_id == channel_id)
            .cloned()
            .collect();
        // 稳定排序：时间戳相同的消息保持追加顺序
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn list_by_sender(&self, sender_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|message| message.sender_id == sender_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}
