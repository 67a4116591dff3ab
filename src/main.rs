use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use esim_storefront_backend::api::{self, AppState};
use esim_storefront_backend::cache::{self, RedisCache};
use esim_storefront_backend::chat::{GeminiClient, LineClient};
use esim_storefront_backend::config::AppConfig;
use esim_storefront_backend::database::{
    self, discount_code_repository::DiscountCodeRepository,
    instruction_repository::InstructionRepository,
    order_repository::{OrderRepository, OrderStore},
    profile_repository::{ProfileRepository, ProfileStore},
    topup_price_repository::TopupPriceRepository,
};
use esim_storefront_backend::esim::client::AiraloClient;
use esim_storefront_backend::esim::pricing::PriceBook;
use esim_storefront_backend::health::HealthChecker;
use esim_storefront_backend::invoice::{InvoiceClient, InvoiceIssuer};
use esim_storefront_backend::logging::init_tracing;
use esim_storefront_backend::payments::gateway::TapPayClient;
use esim_storefront_backend::services::{
    CheckoutService, DiscountService, InstructionService, LineWebhookService, ProfileService,
    TopupCatalogService, UsageService,
};
use esim_storefront_backend::workers::invoice_retry::{InvoiceRetryWorker, DEFAULT_INTERVAL_SECS};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Starting eSIM storefront backend"
    );

    // Database connection pool
    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            e
        })?;
    info!(
        max_connections = config.database.max_connections,
        "✅ Database connection pool initialized"
    );

    // Redis is optional: a failed pool build degrades to cache-less mode
    let redis_cache = {
        let cache_config = cache::CacheConfig {
            redis_url: config.cache.redis_url.clone(),
            max_connections: config.cache.max_connections,
            ..Default::default()
        };
        match cache::init_cache_pool(cache_config).await {
            Ok(pool) => {
                info!("✅ Cache connection pool initialized");
                Some(RedisCache::new(pool))
            }
            Err(e) => {
                warn!("Running without cache, pool init failed: {}", e);
                None
            }
        }
    };

    // Outbound clients
    let provider = Arc::new(AiraloClient::new(config.airalo.clone())?);
    let cards = Arc::new(TapPayClient::new(config.tappay.clone())?);
    let invoices: Arc<dyn InvoiceIssuer> = Arc::new(InvoiceClient::new(config.invoice.clone())?);
    let line = Arc::new(LineClient::new(config.line.clone())?);
    let gemini = Arc::new(GeminiClient::new(config.gemini.clone())?);

    let price_book = Arc::new(PriceBook::load(config.price_book_path.as_deref())?);
    info!(
        external = config.price_book_path.is_some(),
        "✅ Price book loaded"
    );

    // Repositories
    let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db_pool.clone()));
    let profiles: Arc<dyn ProfileStore> = Arc::new(ProfileRepository::new(db_pool.clone()));
    let instructions_repo = Arc::new(InstructionRepository::new(db_pool.clone()));
    let topup_prices = Arc::new(TopupPriceRepository::new(db_pool.clone()));
    let discount_codes = Arc::new(DiscountCodeRepository::new(db_pool.clone()));

    // Services
    let checkout = Arc::new(CheckoutService::new(
        cards.clone(),
        provider.clone(),
        orders.clone(),
        profiles.clone(),
        invoices.clone(),
        price_book.clone(),
        config.tappay.currency.clone(),
        config.invoice.enabled,
    ));
    let topups = Arc::new(TopupCatalogService::new(
        provider.clone(),
        topup_prices,
        price_book.clone(),
        redis_cache.clone(),
        config.tappay.currency.clone(),
    ));
    let usage = Arc::new(UsageService::new(
        provider.clone(),
        redis_cache.clone(),
        Duration::from_secs(config.cache.usage_ttl),
    ));
    let instructions = Arc::new(InstructionService::new(
        provider.clone(),
        instructions_repo,
        orders.clone(),
        redis_cache.clone(),
    ));
    let discounts = Arc::new(DiscountService::new(discount_codes));
    let profile_service = Arc::new(ProfileService::new(profiles.clone(), cards.clone()));
    let line_webhook = Arc::new(LineWebhookService::new(line, gemini));

    let health_checker = HealthChecker::new(db_pool.clone(), redis_cache.clone());

    // Invoice retry worker
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let retry_enabled = std::env::var("INVOICE_RETRY_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let mut retry_handle = None;
    if retry_enabled {
        let interval_secs = std::env::var("INVOICE_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let worker = InvoiceRetryWorker::new(
            orders.clone(),
            profiles.clone(),
            invoices.clone(),
            interval_secs,
        );
        retry_handle = Some(tokio::spawn(async move {
            worker.run(worker_shutdown_rx).await;
        }));
        info!(interval_secs, "✅ Invoice retry worker started");
    } else {
        info!("Invoice retry worker disabled (INVOICE_RETRY_ENABLED=false)");
    }

    let state = AppState {
        checkout,
        topups,
        usage,
        instructions,
        discounts,
        profiles: profile_service,
        line_webhook,
        health: health_checker,
    };

    let app = api::build_router(state, &config.server.cors_allowed_origins);
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = retry_handle {
        if let Err(e) = tokio::time::timeout(Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for invoice retry worker shutdown");
        }
    }

    info!("👋 Server shutdown complete");
    Ok(())
}
