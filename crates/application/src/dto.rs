//! 对外暴露的数据传输对象

use chrono::{DateTime, Utc};
use domain::{Channel, ChatMessage, Listing, ListingStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDto {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub claimant_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub quantity: u32,
    pub category: String,
    pub status: ListingStatus,
    pub expires_at: DateTime<Utc>,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Listing> for ListingDto {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            holder_id: listing.holder_id,
            claimant_id: listing.claimant_id,
            title: listing.title,
            description: listing.description,
            quantity: listing.quantity,
            category: listing.category,
            status: listing.status,
            expires_at: listing.expires_at,
            city: listing.location.city,
            lat: listing.location.lat,
            lon: listing.location.lon,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDto {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub created_at: DateTime<Utc>,
}

impl From<Channel> for ChannelDto {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id,
            participants: [channel.pair.low(), channel.pair.high()],
            created_at: channel.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            channel_id: message.channel_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body: message.body,
            created_at: message.created_at,
        }
    }
}
