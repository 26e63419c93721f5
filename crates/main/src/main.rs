//! 主应用程序入口
//!
//! 启动 Axum Web API 服务，并在同一进程内拉起独立的生命周期巡检任务。

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use application::{
    ChatService, ChatServiceDependencies, LifecycleService, LifecycleServiceDependencies,
    ListingService, ListingServiceDependencies, MessageBroadcaster, SystemClock,
};
use infrastructure::{
    create_pg_pool, AppConfig, ChannelHub, HubConfig, LifecycleScheduler,
    LoggingNotificationDispatcher, PgChannelRepository, PgListingRepository, PgMessageRepository,
};
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();

    tracing::info!(
        "connecting database: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // 存储实现
    let listing_repository = Arc::new(PgListingRepository::new(pg_pool.clone()));
    let channel_repository = Arc::new(PgChannelRepository::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool));

    // 实时连接中枢
    let hub = Arc::new(ChannelHub::new(HubConfig {
        connection_buffer: config.hub.connection_buffer,
    }));

    let clock = Arc::new(SystemClock);

    // 应用层服务
    let listing_service = Arc::new(ListingService::new(ListingServiceDependencies {
        listing_repository: listing_repository.clone(),
        clock: clock.clone(),
    }));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        channel_repository,
        message_repository,
        clock: clock.clone(),
        broadcaster: hub.clone() as Arc<dyn MessageBroadcaster>,
    }));

    // 生命周期巡检：独立周期任务，与请求处理只共享存储
    let lifecycle_service = Arc::new(LifecycleService::new(
        LifecycleServiceDependencies {
            listing_repository,
            dispatcher: Arc::new(LoggingNotificationDispatcher),
            clock,
        },
        chrono::Duration::hours(config.scheduler.notification_window_hours),
    ));
    let _scheduler = LifecycleScheduler::new(
        lifecycle_service,
        Duration::from_secs(config.scheduler.interval_secs),
    )
    .spawn();

    // 启动 Web 服务器
    let state = AppState::new(listing_service, chat_service, hub);
    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("foodbridge server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
