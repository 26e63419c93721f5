//! PostgreSQL 存储实现
//!
//! 认领互斥依赖条件 UPDATE（WHERE status = 期望值），
//! 会话去重依赖 (participant_low, participant_high) 唯一约束 +
//! ON CONFLICT DO NOTHING 后的回查。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use application::repository::{ChannelRepository, ListingRepository, MessageRepository};
use domain::{
    Channel, ChatMessage, ClaimantChange, Listing, ParticipantPair, RepositoryError,
    StatusTransition,
};

pub async fn create_pg_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

const LISTING_COLUMNS: &str = "id, holder_id, holder_contact, title, description, quantity, \
     category, status, claimant_id, expires_at, notified_at, city, lat, lon, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ListingRecord {
    id: Uuid,
    holder_id: Uuid,
    holder_contact: String,
    title: String,
    description: String,
    quantity: i32,
    category: String,
    status: String,
    claimant_id: Option<Uuid>,
    expires_at: DateTime<Utc>,
    notified_at: Option<DateTime<Utc>>,
    city: String,
    lat: f64,
    lon: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ListingRecord> for Listing {
    type Error = RepositoryError;

    fn try_from(value: ListingRecord) -> Result<Self, Self::Error> {
        let status = value
            .status
            .parse()
            .map_err(|_| invalid_data(format!("unknown listing status: {}", value.status)))?;
        let quantity = u32::try_from(value.quantity)
            .map_err(|_| invalid_data("negative quantity in storage"))?;

        Ok(Listing {
            id: value.id,
            holder_id: value.holder_id,
            holder_contact: value.holder_contact,
            title: value.title,
            description: value.description,
            quantity,
            category: value.category,
            status,
            claimant_id: value.claimant_id,
            expires_at: value.expires_at,
            notified_at: value.notified_at,
            location: domain::Location {
                city: value.city,
                lat: value.lat,
                lon: value.lon,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgListingRepository {
    pool: PgPool,
}

impl PgListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ListingRepository for PgListingRepository {
    async fn create(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let sql = format!(
            "INSERT INTO listings ({LISTING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {LISTING_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ListingRecord>(&sql)
            .bind(listing.id)
            .bind(listing.holder_id)
            .bind(&listing.holder_contact)
            .bind(&listing.title)
            .bind(&listing.description)
            .bind(listing.quantity as i32)
            .bind(&listing.category)
            .bind(listing.status.as_str())
            .bind(listing.claimant_id)
            .bind(listing.expires_at)
            .bind(listing.notified_at)
            .bind(&listing.location.city)
            .bind(listing.location.lat)
            .bind(listing.location.lon)
            .bind(listing.created_at)
            .bind(listing.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Listing::try_from(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1");
        let record = sqlx::query_as::<_, ListingRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(Listing::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings ORDER BY created_at");
        let records = sqlx::query_as::<_, ListingRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        records.into_iter().map(Listing::try_from).collect()
    }

    async fn list_by_holder(&self, holder_id: Uuid) -> Result<Vec<Listing>, RepositoryError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE holder_id = $1 ORDER BY created_at"
        );
        let records = sqlx::query_as::<_, ListingRecord>(&sql)
            .bind(holder_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        records.into_iter().map(Listing::try_from).collect()
    }

    async fn apply(
        &self,
        id: Uuid,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Listing, RepositoryError> {
        // WHERE status = 期望值 使整个转换成为一次比较-交换，
        // 两个并发认领者只会有一个命中行
        let record = match transition.claimant {
            ClaimantChange::Keep => {
                let sql = format!(
                    "UPDATE listings SET status = $3, updated_at = $4 \
                     WHERE id = $1 AND status = $2 RETURNING {LISTING_COLUMNS}"
                );
                sqlx::query_as::<_, ListingRecord>(&sql)
                    .bind(id)
                    .bind(transition.expected.as_str())
                    .bind(transition.next.as_str())
                    .bind(now)
                    .fetch_optional(&self.pool)
                    .await
            }
            ClaimantChange::Assign(claimant_id) => {
                let sql = format!(
                    "UPDATE listings SET status = $3, claimant_id = $5, updated_at = $4 \
                     WHERE id = $1 AND status = $2 RETURNING {LISTING_COLUMNS}"
                );
                sqlx::query_as::<_, ListingRecord>(&sql)
                    .bind(id)
                    .bind(transition.expected.as_str())
                    .bind(transition.next.as_str())
                    .bind(now)
                    .bind(claimant_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            ClaimantChange::Clear => {
                let sql = format!(
                    "UPDATE listings SET status = $3, claimant_id = NULL, updated_at = $4 \
                     WHERE id = $1 AND status = $2 RETURNING {LISTING_COLUMNS}"
                );
                sqlx::query_as::<_, ListingRecord>(&sql)
                    .bind(id)
                    .bind(transition.expected.as_str())
                    .bind(transition.next.as_str())
                    .bind(now)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_err)?;

        match record {
            Some(record) => Listing::try_from(record),
            None => {
                if self.exists(id).await? {
                    Err(RepositoryError::Conflict)
                } else {
                    Err(RepositoryError::NotFound)
                }
            }
        }
    }

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE listings SET notified_at = $2, updated_at = $2 \
             WHERE id = $1 AND notified_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(id).await? {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

const CHANNEL_COLUMNS: &str = "id, participant_low, participant_high, created_at";

#[derive(Debug, FromRow)]
struct ChannelRecord {
    id: Uuid,
    participant_low: Uuid,
    participant_high: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChannelRecord> for Channel {
    type Error = RepositoryError;

    fn try_from(value: ChannelRecord) -> Result<Self, Self::Error> {
        let pair = ParticipantPair::new(value.participant_low, value.participant_high)
            .map_err(|err| invalid_data(err.to_string()))?;
        Ok(Channel::between(value.id, pair, value.created_at))
    }
}

#[derive(Clone)]
pub struct PgChannelRepository {
    pool: PgPool,
}

impl PgChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for PgChannelRepository {
    async fn get_or_create(&self, candidate: Channel) -> Result<Channel, RepositoryError> {
        let sql = format!(
            "INSERT INTO channels ({CHANNEL_COLUMNS}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (participant_low, participant_high) DO NOTHING \
             RETURNING {CHANNEL_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ChannelRecord>(&sql)
            .bind(candidate.id)
            .bind(candidate.pair.low())
            .bind(candidate.pair.high())
            .bind(candidate.created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if let Some(record) = inserted {
            return Channel::try_from(record);
        }

        // 插入竞争落败：回查既有会话（会话从不删除，必然存在）
        let sql = format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels \
             WHERE participant_low = $1 AND participant_high = $2"
        );
        let record = sqlx::query_as::<_, ChannelRecord>(&sql)
            .bind(candidate.pair.low())
            .bind(candidate.pair.high())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Channel::try_from(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Channel>, RepositoryError> {
        let sql = format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1");
        let record = sqlx::query_as::<_, ChannelRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(Channel::try_from).transpose()
    }

    async fn list_for_participant(&self, party: Uuid) -> Result<Vec<Channel>, RepositoryError> {
        let sql = format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels \
             WHERE participant_low = $1 OR participant_high = $1 ORDER BY created_at"
        );
        let records = sqlx::query_as::<_, ChannelRecord>(&sql)
            .bind(party)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        records.into_iter().map(Channel::try_from).collect()
    }
}

const MESSAGE_COLUMNS: &str = "id, channel_id, sender_id, receiver_id, body, created_at";

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    channel_id: Uuid,
    sender_id: Uuid,
    receiver_id: Option<Uuid>,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRecord> for ChatMessage {
    fn from(value: MessageRecord) -> Self {
        ChatMessage {
            id: value.id,
            channel_id: value.channel_id,
            sender_id: value.sender_id,
            receiver_id: value.receiver_id,
            body: value.body,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let sql = format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(message.id)
            .bind(message.channel_id)
            .bind(message.sender_id)
            .bind(message.receiver_id)
            .bind(&message.body)
            .bind(message.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match &err {
                // 外键违例意味着目标会话不存在
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    RepositoryError::NotFound
                }
                _ => map_sqlx_err(err),
            })?;

        Ok(record.into())
    }

    async fn history(&self, channel_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = $1 ORDER BY created_at"
        );
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(ChatMessage::from).collect())
    }

    async fn list_by_sender(&self, sender_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE sender_id = $1 ORDER BY created_at"
        );
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(sender_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(ChatMessage::from).collect())
    }
}
