use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::{net::TcpListener, sync::oneshot};

use application::{
    ChatService, ChatServiceDependencies, ListingService, ListingServiceDependencies,
    MessageBroadcaster, SystemClock,
};
use application::memory::{InMemoryChatStore, InMemoryListingRepository};
use infrastructure::{ChannelHub, HubConfig};
use web_api::{router, AppState};

/// 用内存存储搭建完整的路由，测试不依赖外部数据库
pub fn build_router() -> Router {
    let listing_repository = Arc::new(InMemoryListingRepository::new());
    let chat_store = Arc::new(InMemoryChatStore::new());
    let hub = Arc::new(ChannelHub::new(HubConfig::default()));
    let clock = Arc::new(SystemClock);

    let listing_service = Arc::new(ListingService::new(ListingServiceDependencies {
        listing_repository,
        clock: clock.clone(),
    }));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        channel_repository: chat_store.clone(),
        message_repository: chat_store,
        clock,
        broadcaster: hub.clone() as Arc<dyn MessageBroadcaster>,
    }));

    router(AppState::new(listing_service, chat_service, hub))
}

/// 在随机端口上启动服务，返回地址与关闭句柄
pub async fn spawn_app() -> (SocketAddr, oneshot::Sender<()>) {
    let app = build_router();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    (addr, shutdown_tx)
}
