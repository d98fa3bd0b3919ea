//! API handlers module

pub mod accounting;
pub mod admin;
pub mod campaigns;
pub mod dashboard;
pub mod facilities;
pub mod finance;
pub mod health;
pub mod kaizen;
pub mod leads;
pub mod meetings;
pub mod people;
pub mod sessions;
pub mod tickets;

use campusdesk_common::db::PageRequest;
use serde::Deserialize;

/// `limit` / `offset` query parameters shared by every list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pagination {
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.limit, self.offset)
    }
}
