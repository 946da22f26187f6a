use anyhow::Context;
use examshop_api::{app, AppState, ShopSettings};
use examshop_store::{
    app_config::Config, DbClient, HttpSmsNotifier, PaystackGateway, PgCatalogStore, PgOrderRepository, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "examshop_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting exam shop API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let redis = RedisClient::new(&config.redis.url, config.redis.session_ttl_seconds)
        .await
        .context("Failed to create Redis client")?;
    if let Err(e) = redis.ping().await {
        tracing::warn!("Redis is not answering yet: {}", e);
    }

    let gateway = PaystackGateway::new(&config.paystack).context("Failed to build Paystack client")?;
    let notifier = HttpSmsNotifier::new(&config.sms).context("Failed to build SMS client")?;
    if config.sms.api_key.as_deref().unwrap_or_default().is_empty() {
        tracing::warn!("No SMS API key configured; access passwords will not be delivered");
    }

    let orders = Arc::new(PgOrderRepository::new(db.pool.clone()));
    let state = AppState::build(
        Arc::new(PgCatalogStore::new(db.pool.clone())),
        Arc::new(redis),
        orders.clone(),
        orders,
        Arc::new(gateway),
        Arc::new(notifier),
        ShopSettings {
            callback_url: config.shop.callback_url(),
            reference_attempts: config.shop.reference_attempts,
            country_code: config.shop.country_code.clone(),
            paystack_secret: config.paystack.secret_key.clone(),
            session_cookie: config.shop.session_cookie.clone(),
        },
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
