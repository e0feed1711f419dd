//! Service state management and component initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::signals::wait_for_shutdown;
use price_cache::PriceCache;
use price_fetcher::{AwattarClient, PriceScheduler, PriceService, PriceSource, Refresher};
use price_model::{Clock, PriceUpdate, SystemClock};
use price_notifier::{
    InMemoryTokenStore, LoggingSender, NotificationDispatcher, SqliteTokenStore, TokenStore,
};

/// Initialized components of the service
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Price access shared by the HTTP routes and the scheduler
    pub prices: PriceService,

    /// Notification dispatcher, absent when notifications are disabled
    pub dispatcher: Option<NotificationDispatcher>,

    /// New prices published by the refresher, consumed by the dispatcher
    updates: Option<mpsc::Receiver<PriceUpdate>>,
}

impl ServiceState {
    /// Create a new service state talking to the real upstream API
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let source = AwattarClient::new(config.fetcher.upstream.clone())
            .context("Failed to create upstream client")?;
        Self::with_source(config, Arc::new(source), Arc::new(SystemClock)).await
    }

    /// Create a new service state with an explicit price source and clock
    pub async fn with_source(
        config: ServiceConfig,
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        info!("Initializing service components...");

        info!("Initializing PriceCache in {:?}", config.cache.price_data_dir());
        let cache = PriceCache::new(config.cache.clone()).context("Failed to create price cache")?;

        let mut refresher = Refresher::new(&config.fetcher, source, cache, clock.clone());

        let (dispatcher, updates) = if config.notifier.enabled {
            info!("Initializing NotificationDispatcher...");
            let store = token_store(&config).await?;
            let dispatcher = NotificationDispatcher::new(
                store,
                Arc::new(LoggingSender),
                clock,
                config.notifier.messages.clone(),
            );
            let (updates_tx, updates_rx) = mpsc::channel(config.service.update_channel_capacity);
            refresher = refresher.with_updates(updates_tx);
            (Some(dispatcher), Some(updates_rx))
        } else {
            info!("Price notifications disabled");
            (None, None)
        };

        let prices = PriceService::new(Arc::new(refresher));
        Ok(Self { config, prices, dispatcher, updates })
    }

    /// Run scheduler, notifier and HTTP server until shutdown is requested
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Self { config, prices, dispatcher, updates } = self;

        let scheduler_handle = if config.fetcher.scheduler.enabled {
            info!("Starting PriceScheduler...");
            let scheduler = PriceScheduler::new(prices.clone(), &config.fetcher.scheduler);
            Some(tokio::spawn(scheduler.run(shutdown.clone())))
        } else {
            None
        };

        let dispatcher_handle = match (dispatcher, updates) {
            (Some(dispatcher), Some(updates)) => {
                info!("Starting NotificationDispatcher...");
                Some(tokio::spawn(dispatcher.run(updates)))
            }
            _ => None,
        };

        let addr = config.gateway.server_addr().context("Invalid server address")?;
        let routes = price_gateway::create_routes(prices);
        let mut server_shutdown = shutdown.clone();
        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async move {
                wait_for_shutdown(&mut server_shutdown).await;
            })
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
        info!("HTTP server listening on http://{}", bound);
        let server_handle = tokio::spawn(server);

        wait_for_shutdown(&mut shutdown).await;
        info!("Starting graceful shutdown...");

        let shutdown_timeout = Duration::from_secs(config.service.shutdown_timeout_secs);
        await_task("HTTP server", Some(server_handle), shutdown_timeout).await;
        await_task("PriceScheduler", scheduler_handle, shutdown_timeout).await;
        // Ends once the server and scheduler have dropped the refresher
        await_task("NotificationDispatcher", dispatcher_handle, shutdown_timeout).await;

        info!("Graceful shutdown complete");
        Ok(())
    }
}

async fn token_store(config: &ServiceConfig) -> Result<Arc<dyn TokenStore>> {
    match &config.notifier.database_url {
        Some(url) => {
            let store = SqliteTokenStore::connect(url, config.notifier.max_connections)
                .await
                .context("Failed to connect to token database")?;
            store.ensure_schema().await.context("Failed to prepare token database")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No token database configured, no subscribers will be notified");
            Ok(Arc::new(InMemoryTokenStore::default()))
        }
    }
}

/// Wait for a component task with timeout
async fn await_task(name: &str, handle: Option<JoinHandle<()>>, limit: Duration) {
    let Some(handle) = handle else {
        return;
    };

    match timeout(limit, handle).await {
        Ok(Ok(())) => info!("{} stopped gracefully", name),
        Ok(Err(e)) => error!("{} task failed: {}", name, e),
        Err(_) => warn!("{} did not stop within timeout, forcing shutdown", name),
    }
}
