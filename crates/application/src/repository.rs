use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Channel, ChatMessage, Listing, RepositoryError, StatusTransition};
use uuid::Uuid;

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn create(&self, listing: Listing) -> Result<Listing, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError>;

    // 调度器全量扫描；当前规模下可接受
    async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError>;

    async fn list_by_holder(&self, holder_id: Uuid) -> Result<Vec<Listing>, RepositoryError>;

    /// 原子条件状态转换：仅当当前状态等于 transition.expected 时生效，
    /// 否则返回 Conflict。这是认领互斥的唯一保证点，实现不得使用
    /// 先读后写的两步方案。
    async fn apply(
        &self,
        id: Uuid,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Listing, RepositoryError>;

    /// 写入临期提醒标记；仅当尚未标记时写入，返回是否发生了写入
    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// 原子化的查找或创建：同一参与者对并发调用时必须收敛到同一个会话。
    /// 落败的插入方应重查并返回既有会话，而不是向调用方暴露冲突。
    async fn get_or_create(&self, candidate: Channel) -> Result<Channel, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Channel>, RepositoryError>;

    async fn list_for_participant(&self, party: Uuid) -> Result<Vec<Channel>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 追加一条消息；会话不存在时返回 NotFound
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError>;

    /// 会话内全部消息，按创建时间升序；无消息返回空序列
    async fn history(&self, channel_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError>;

    // 构建收件箱用：该参与者作为发送方的全部消息，升序
    async fn list_by_sender(&self, sender_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError>;
}
