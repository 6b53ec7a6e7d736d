use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

use server::cache::{CacheStore, MemoryCache, RedisCache};
use server::config::{AppConfig, CacheBackend, DriverKind};
use server::consumers::flag_check::{consume_flag_checks, requeue_unchecked};
use server::driver::{ContainerDriver, DisabledDriver, DockerDriver};
use server::engine::{ContainerManager, FlagChecker, ScoreboardService, run_container_reaper};
use server::notify::BroadcastSink;
use server::queue::init_mq;
use server::state::AppState;

/// Capacity of the in-process game event channel.
const EVENT_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    server::seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;

    let cache: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Redis => Arc::new(
            RedisCache::connect(&config.cache.url)
                .await
                .context("Failed to connect to cache")?,
        ),
    };

    let driver: Arc<dyn ContainerDriver> = match config.container.driver {
        DriverKind::Docker => Arc::new(
            DockerDriver::new(
                config.container.docker_bin.clone(),
                config.container.public_host.clone(),
            )
            .with_storage_limit(config.container.storage_limit),
        ),
        DriverKind::Disabled => Arc::new(DisabledDriver),
    };
    info!(driver = driver.name(), "Container driver selected");

    let events = Arc::new(BroadcastSink::new(EVENT_CAPACITY));
    let shutdown = CancellationToken::new();

    let scoreboard = Arc::new(ScoreboardService::new(
        db.clone(),
        cache,
        config.scoreboard.ttl(),
        config.scoreboard.generation_timeout(),
        shutdown.clone(),
    ));
    let checker = Arc::new(FlagChecker::new(
        db.clone(),
        Arc::clone(&scoreboard),
        events.clone(),
    ));
    let containers = Arc::new(ContainerManager::new(
        db.clone(),
        driver,
        events,
        config.container.settings(),
        shutdown.clone(),
    ));

    let mq = if config.mq.enabled {
        let mq = Arc::new(
            init_mq(&config.mq)
                .await
                .context("Failed to initialize MQ")?,
        );
        info!(queue_name = %config.mq.queue_name, "MQ connected");

        if let Err(e) = requeue_unchecked(&db, &mq, &config.mq.queue_name).await {
            warn!(error = %e, "Failed to re-enqueue unchecked submissions");
        }

        tokio::spawn(consume_flag_checks(
            Arc::clone(&checker),
            Arc::clone(&mq),
            config.mq.queue_name.clone(),
            config.mq.concurrency,
        ));
        Some(mq)
    } else {
        info!("MQ disabled, answers are checked inline");
        None
    };

    let reaper = tokio::spawn(run_container_reaper(
        Arc::clone(&containers),
        config.container.reaper_interval(),
        shutdown.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        config,
        containers,
        checker,
        scoreboard,
        mq,
    };
    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
            token.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = reaper.await;

    Ok(())
}
