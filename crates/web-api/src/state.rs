use std::sync::Arc;

use application::{ChatService, ListingService};
use infrastructure::ChannelHub;

#[derive(Clone)]
pub struct AppState {
    pub listing_service: Arc<ListingService>,
    pub chat_service: Arc<ChatService>,
    pub hub: Arc<ChannelHub>,
}

impl AppState {
    pub fn new(
        listing_service: Arc<ListingService>,
        chat_service: Arc<ChatService>,
        hub: Arc<ChannelHub>,
    ) -> Self {
        Self {
            listing_service,
            chat_service,
            hub,
        }
    }
}
