//! Database layer for CampusDesk
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management with retrying connect
//! - Schema bootstrap

pub mod models;
mod repository;
mod schema;

pub use repository::{
    AccountChanges, CampaignChanges, EntryChanges, EntryWithLines, InvoiceChanges,
    JournalLineInput, LeadChanges, MeetingChanges, MeetingDetail, NewAccount, NewCampaign,
    NewEntry, NewInvoice, NewLead, NewMeeting, NewObligation, NewParticipant, NewPerson, NewRoom,
    NewSuggestion, NewTicket, ObligationChanges, Page, PageRequest, PersonChanges, Repository,
    RoomChanges, SuggestionChanges, SuggestionReview, SuggestionWithVotes, TicketChanges,
    TranscriptChunkInput, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use schema::ensure_schema;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use backoff::{future::retry, ExponentialBackoffBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::{info, warn};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");
        let primary = connect_with_retry(config, &config.url, "primary").await?;

        // Connect to replica if configured
        let replica = match config.read_url.as_deref() {
            Some(read_url) if read_url != config.url => {
                info!("Connecting to read replica...");
                Some(connect_with_retry(config, read_url, "replica").await?)
            }
            _ => None,
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Wrap an existing connection (tests, single-node setups)
    pub fn from_connection(primary: DatabaseConnection) -> Self {
        Self {
            primary,
            replica: None,
        }
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}

fn connect_options(config: &DatabaseConfig, url: &str) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);
    opts
}

/// Connect, retrying with exponential backoff for up to `connect_retry_secs`
async fn connect_with_retry(
    config: &DatabaseConfig,
    url: &str,
    role: &'static str,
) -> Result<DatabaseConnection> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(250))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(Duration::from_secs(config.connect_retry_secs)))
        .build();

    retry(policy, || async {
        Database::connect(connect_options(config, url))
            .await
            .map_err(|e| {
                warn!(role, error = %e, "Database connect failed, retrying");
                backoff::Error::transient(e)
            })
    })
    .await
    .map_err(|e| AppError::DatabaseConnection {
        message: format!("Failed to connect to {}: {}", role, e),
    })
}

/// In-memory SQLite pool with the schema applied
#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    // a single connection keeps one shared in-memory database
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opts).await.unwrap();
    conn.execute_unprepared("PRAGMA foreign_keys = ON")
        .await
        .unwrap();
    ensure_schema(&conn).await.unwrap();
    DbPool::from_connection(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_in_memory() {
        let pool = test_pool().await;
        tokio_test::assert_ok!(pool.ping().await);
        // no replica: reads go to the primary
        assert!(pool.replica.is_none());
    }

    #[tokio::test]
    async fn test_schema_bootstrap_is_idempotent() {
        let pool = test_pool().await;
        tokio_test::assert_ok!(ensure_schema(pool.write()).await);
    }
}
