//! Status lifecycles
//!
//! Each status column is a finite-state machine. The transition table is
//! the only source of truth for which status changes a handler may apply.

use crate::db::models::{
    CampaignStatus, FinancialStatus, JournalStatus, KaizenStatus, LeadStatus, MeetingApproval,
    TicketStatus,
};
use crate::errors::{AppError, Result};
use sea_orm::ActiveEnum;

/// A status enum with an explicit transition table
pub trait Lifecycle: ActiveEnum<Value = String> + Copy + PartialEq + 'static {
    /// Human name of the owning entity, used in error messages
    const ENTITY: &'static str;

    /// States reachable in one step from `self`
    fn allowed_next(&self) -> &'static [Self];

    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Wire label, e.g. `under_review`
    fn label(&self) -> String {
        self.to_value()
    }

    /// Validate a move to `next`. Staying in the same state is a no-op.
    fn transition(self, next: Self) -> Result<Self> {
        if self == next || self.can_transition_to(next) {
            Ok(next)
        } else {
            crate::metrics::record_transition_rejected(Self::ENTITY);
            Err(AppError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.label(),
                to: next.label(),
            })
        }
    }
}

/// Resolve an optional requested status against the current one.
///
/// Returns `Some(next)` only when the status actually changes, so callers
/// can skip writing the column (and stamping timestamps) on a no-op.
pub fn resolve<S: Lifecycle>(current: S, requested: Option<S>) -> Result<Option<S>> {
    match requested {
        None => Ok(None),
        Some(next) if next == current => Ok(None),
        Some(next) => {
            current.transition(next)?;
            Ok(Some(next))
        }
    }
}

/// Count a status change once the guarded write has been applied
pub fn record_applied<S: Lifecycle>(next: Option<S>) {
    if let Some(next) = next {
        crate::metrics::record_transition(S::ENTITY, next.label());
    }
}

impl Lifecycle for LeadStatus {
    const ENTITY: &'static str = "lead";

    fn allowed_next(&self) -> &'static [Self] {
        use LeadStatus::*;
        match self {
            New => &[Contacted, Lost],
            Contacted => &[Qualified, Lost],
            Qualified => &[Negotiating, Lost],
            Negotiating => &[Won, Lost],
            Won | Lost => &[],
        }
    }
}

impl Lifecycle for JournalStatus {
    const ENTITY: &'static str = "journal entry";

    fn allowed_next(&self) -> &'static [Self] {
        use JournalStatus::*;
        match self {
            Draft => &[Posted],
            Posted => &[Reversed],
            Reversed => &[],
        }
    }
}

impl Lifecycle for KaizenStatus {
    const ENTITY: &'static str = "suggestion";

    fn allowed_next(&self) -> &'static [Self] {
        use KaizenStatus::*;
        match self {
            Submitted => &[UnderReview, Rejected],
            UnderReview => &[Approved, Rejected, Deferred],
            Deferred => &[UnderReview],
            Approved => &[Implemented],
            Rejected | Implemented => &[],
        }
    }
}

impl Lifecycle for FinancialStatus {
    const ENTITY: &'static str = "financial record";

    fn allowed_next(&self) -> &'static [Self] {
        use FinancialStatus::*;
        match self {
            Draft => &[Pending, Cancelled],
            Pending => &[Paid, Overdue, Cancelled],
            Overdue => &[Paid, Cancelled],
            Paid | Cancelled => &[],
        }
    }
}

impl Lifecycle for MeetingApproval {
    const ENTITY: &'static str = "meeting";

    fn allowed_next(&self) -> &'static [Self] {
        use MeetingApproval::*;
        match self {
            Pending => &[Approved, Rejected],
            Approved | Rejected => &[],
        }
    }
}

impl Lifecycle for CampaignStatus {
    const ENTITY: &'static str = "campaign";

    fn allowed_next(&self) -> &'static [Self] {
        use CampaignStatus::*;
        match self {
            Draft => &[Scheduled, Cancelled],
            Scheduled => &[Active, Cancelled],
            Active => &[Paused, Completed, Cancelled],
            Paused => &[Active, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

impl Lifecycle for TicketStatus {
    const ENTITY: &'static str = "ticket";

    fn allowed_next(&self) -> &'static [Self] {
        use TicketStatus::*;
        match self {
            Open => &[InProgress, Resolved, Closed],
            InProgress => &[Open, Resolved],
            Resolved => &[Open, Closed],
            Closed => &[],
        }
    }
}
