//! Domain rules shared by handlers and the repository
//!
//! Everything here is pure: no I/O, no database access.

pub mod finance;
pub mod ledger;
pub mod lifecycle;
pub mod reports;
pub mod voting;

pub use ledger::{LineAmounts, PostingLine, TrialBalance, TrialBalanceRow};
pub use lifecycle::{record_applied as record_status_change, resolve as resolve_status, Lifecycle};
pub use voting::{VoteTally, VoteValue};
