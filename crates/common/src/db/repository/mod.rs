//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.
//!
//! Every method takes the caller's `org_id` and filters by it. A record of
//! another organization is reported exactly like a missing one.

mod accounting;
mod campaigns;
mod facilities;
mod finance;
mod kaizen;
mod leads;
mod meetings;
mod people;
mod tickets;

pub use accounting::{AccountChanges, EntryChanges, EntryWithLines, JournalLineInput, NewAccount, NewEntry};
pub use campaigns::{CampaignChanges, NewCampaign};
pub use facilities::{NewRoom, RoomChanges};
pub use finance::{InvoiceChanges, NewInvoice, NewObligation, ObligationChanges};
pub use kaizen::{NewSuggestion, SuggestionChanges, SuggestionReview, SuggestionWithVotes};
pub use leads::{LeadChanges, NewLead};
pub use meetings::{
    MeetingChanges, MeetingDetail, NewMeeting, NewParticipant, TranscriptChunkInput,
};
pub use people::{NewPerson, PersonChanges};
pub use tickets::{NewTicket, TicketChanges};

use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect, Select};
use serde::Serialize;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Largest page a caller may ask for
pub const MAX_PAGE_SIZE: u64 = 200;

/// Requested window into a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

impl PageRequest {
    /// Apply defaults and clamp the limit to `1..=MAX_PAGE_SIZE`
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a list plus the total number of matching rows
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// Count and fetch one window of `select`
async fn paginate<E>(
    conn: &DatabaseConnection,
    select: Select<E>,
    page: PageRequest,
) -> Result<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let total = select.clone().count(conn).await?;
    let items = select
        .offset(page.offset)
        .limit(page.limit)
        .all(conn)
        .await?;

    Ok(Page {
        items,
        total,
        limit: page.limit,
        offset: page.offset,
    })
}

/// A guarded update that matched no row lost a race with another writer
fn ensure_applied(rows_affected: u64, resource_type: &str) -> Result<()> {
    if rows_affected == 0 {
        Err(AppError::Conflict {
            message: format!("The {} was modified concurrently; reload and retry", resource_type),
        })
    } else {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamps() {
        assert_eq!(PageRequest::default().limit, DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(10_000), None).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(0), Some(7)).limit, 1);
        assert_eq!(PageRequest::new(None, Some(7)).offset, 7);
    }

    #[test]
    fn test_ensure_applied() {
        assert!(ensure_applied(1, "lead").is_ok());
        assert!(matches!(
            ensure_applied(0, "lead"),
            Err(AppError::Conflict { .. })
        ));
    }
}
