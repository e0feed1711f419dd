//! Sources of registered notification subscribers

use crate::error::{NotifierError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use price_model::{Decimal, Region, Subscriber};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, warn};

/// Read access to registered subscribers
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Subscribers of a region with an active price-below notification
    async fn list_active_subscribers(&self, region: Region) -> Result<Vec<Subscriber>>;
}

/// Token store kept in memory
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl InMemoryTokenStore {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self { subscribers: RwLock::new(subscribers) }
    }

    /// Add a subscriber or replace the one with the same id
    pub fn upsert(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.write();
        match subscribers.iter_mut().find(|existing| existing.id == subscriber.id) {
            Some(existing) => *existing = subscriber,
            None => subscribers.push(subscriber),
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn list_active_subscribers(&self, region: Region) -> Result<Vec<Subscriber>> {
        Ok(self
            .subscribers
            .read()
            .iter()
            .filter(|subscriber| subscriber.active && subscriber.region == region)
            .cloned()
            .collect())
    }
}

const CREATE_TOKEN_TABLE: &str = "CREATE TABLE IF NOT EXISTS token (
    token_id INTEGER PRIMARY KEY,
    token TEXT NOT NULL UNIQUE,
    region TEXT NOT NULL,
    tax BOOLEAN NOT NULL DEFAULT 0,
    base_fee REAL NOT NULL DEFAULT 0
)";

const CREATE_PRICE_BELOW_TABLE: &str = "CREATE TABLE IF NOT EXISTS price_below_notification (
    token_id INTEGER PRIMARY KEY REFERENCES token(token_id),
    active BOOLEAN NOT NULL,
    below_value REAL
)";

const SELECT_ACTIVE_SUBSCRIBERS: &str = "SELECT t.token AS token, t.region AS region, t.tax AS tax,
        CAST(p.below_value AS TEXT) AS below_value
    FROM token t
    JOIN price_below_notification p ON p.token_id = t.token_id
    WHERE t.region = ? AND p.active = 1 AND p.below_value IS NOT NULL
    ORDER BY t.token_id";

/// Token store backed by the app's SQLite database
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Connect to the database at `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
        debug!("Connected to token database {}", url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the token tables if they don't exist
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TOKEN_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_PRICE_BELOW_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn list_active_subscribers(&self, region: Region) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(SELECT_ACTIVE_SUBSCRIBERS)
            .bind(region.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut subscribers = Vec::with_capacity(rows.len());
        for row in rows {
            let token: String = row.try_get("token")?;
            match subscriber_from_row(&row, token.clone()) {
                Ok(subscriber) => subscribers.push(subscriber),
                Err(e) => warn!("Skipping token {}: {}", token, e),
            }
        }

        debug!("Loaded {} active {} subscribers", subscribers.len(), region);
        Ok(subscribers)
    }
}

fn subscriber_from_row(row: &sqlx::sqlite::SqliteRow, token: String) -> Result<Subscriber> {
    let region: String = row.try_get("region")?;
    let tax: bool = row.try_get("tax")?;
    let below_value: String = row.try_get("below_value")?;

    let region = Region::from_str(&region).map_err(|e| NotifierError::invalid_record(e.to_string()))?;
    let threshold = Decimal::from_str(&below_value)
        .map_err(|e| NotifierError::invalid_record(format!("below_value {:?}: {}", below_value, e)))?;

    Ok(Subscriber { id: token, region, tax_opt_in: tax, threshold, active: true })
}
