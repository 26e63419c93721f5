use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    ChannelDto, CreateListingRequest, ListingDto, MessageDto, SendMessageRequest,
};

use crate::{error::ApiError, state::AppState, websocket};

#[derive(Debug, Deserialize)]
struct CreateListingPayload {
    holder_id: Uuid,
    holder_contact: String,
    title: String,
    #[serde(default)]
    description: String,
    quantity: u32,
    category: String,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct ClaimPayload {
    claimant_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ResolveChannelPayload {
    party_a: Uuid,
    party_b: Uuid,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    sender_id: Uuid,
    receiver_id: Option<Uuid>,
    body: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", post(create_listing).get(list_listings))
        .route("/listings/holder/{holder_id}", get(list_holder_listings))
        .route("/listings/{id}", get(get_listing))
        .route("/listings/{id}/claim", post(claim_listing))
        .route("/listings/{id}/cancel", post(cancel_claim))
        .route("/listings/{id}/pickup", post(pickup_listing))
        .route("/channels/resolve", post(resolve_channel))
        .route("/channels/user/{party_id}", get(list_user_channels))
        .route(
            "/channels/{id}/messages",
            post(send_message).get(get_history),
        )
        .route("/inbox/{party_id}", get(get_inbox))
        .route("/ws", get(websocket::websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_listing(
    State(state): State<AppState>,
    Json(payload): Json<CreateListingPayload>,
) -> Result<(StatusCode, Json<ListingDto>), ApiError> {
    let listing = state
        .listing_service
        .create(CreateListingRequest {
            holder_id: payload.holder_id,
            holder_contact: payload.holder_contact,
            title: payload.title,
            description: payload.description,
            quantity: payload.quantity,
            category: payload.category,
            expires_at: payload.expires_at,
            city: payload.city,
            lat: payload.lat,
            lon: payload.lon,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(listing.into())))
}

async fn list_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingDto>>, ApiError> {
    let listings = state.listing_service.list_all().await?;
    Ok(Json(listings.into_iter().map(ListingDto::from).collect()))
}

async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDto>, ApiError> {
    let listing = state.listing_service.get(id).await?;
    Ok(Json(listing.into()))
}

async fn list_holder_listings(
    State(state): State<AppState>,
    Path(holder_id): Path<Uuid>,
) -> Result<Json<Vec<ListingDto>>, ApiError> {
    let listings = state.listing_service.list_by_holder(holder_id).await?;
    Ok(Json(listings.into_iter().map(ListingDto::from).collect()))
}

async fn claim_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimPayload>,
) -> Result<Json<ListingDto>, ApiError> {
    let listing = state
        .listing_service
        .claim(id, payload.claimant_id)
        .await?;
    Ok(Json(listing.into()))
}

async fn cancel_claim(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDto>, ApiError> {
    let listing = state.listing_service.cancel(id).await?;
    Ok(Json(listing.into()))
}

async fn pickup_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDto>, ApiError> {
    let listing = state.listing_service.pickup(id).await?;
    Ok(Json(listing.into()))
}

async fn resolve_channel(
    State(state): State<AppState>,
    Json(payload): Json<ResolveChannelPayload>,
) -> Result<Json<ChannelDto>, ApiError> {
    let channel = state
        .chat_service
        .resolve_channel(payload.party_a, payload.party_b)
        .await?;
    Ok(Json(channel.into()))
}

async fn list_user_channels(
    State(state): State<AppState>,
    Path(party_id): Path<Uuid>,
) -> Result<Json<Vec<ChannelDto>>, ApiError> {
    let channels = state.chat_service.channels_for(party_id).await?;
    Ok(Json(channels.into_iter().map(ChannelDto::from).collect()))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let message = state
        .chat_service
        .send_message(SendMessageRequest {
            channel_id: id,
            sender_id: payload.sender_id,
            receiver_id: payload.receiver_id,
            body: payload.body,
            origin_connection: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = state.chat_service.history(id).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

async fn get_inbox(
    State(state): State<AppState>,
    Path(party_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = state.chat_service.inbox(party_id).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}
