//! Chart of accounts, journal entry and trial balance handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Pagination;
use crate::extract::{double_option, QueryParams, ValidJson};
use campusdesk_common::{
    auth::AuthContext,
    db::{
        models::{Account, AccountType, JournalEntry, JournalStatus},
        AccountChanges, EntryChanges, EntryWithLines, JournalLineInput, NewAccount, NewEntry,
        Page, Repository,
    },
    domain::{Lifecycle, TrialBalance},
    errors::{AppError, Result},
};

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 3, max = 10))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub account_type: AccountType,
}

/// The code is immutable once created
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountFilter {
    pub is_active: Option<bool>,
    pub account_type: Option<AccountType>,
}

pub async fn list_accounts(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<AccountFilter>,
) -> Result<Json<Page<Account>>> {
    Ok(Json(
        repo.list_accounts(
            auth.org_id,
            filter.is_active,
            filter.account_type,
            pagination.page(),
        )
        .await?,
    ))
}

pub async fn create_account(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>)> {
    let account = repo
        .create_account(
            auth.org_id,
            NewAccount {
                code: request.code,
                name: request.name,
                account_type: request.account_type,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        account_id = %account.id,
        code = %account.code,
        "Account created"
    );
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>> {
    Ok(Json(repo.find_account(auth.org_id, id).await?))
}

pub async fn update_account(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateAccountRequest>,
) -> Result<Json<Account>> {
    let account = repo
        .update_account(
            auth.org_id,
            id,
            AccountChanges {
                name: request.name,
                is_active: request.is_active,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, account_id = %id, "Account updated");
    Ok(Json(account))
}

// ============================================================================
// Journal entries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JournalLineRequest {
    pub account_id: Uuid,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub debit_cents: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub credit_cents: i64,
}

impl From<JournalLineRequest> for JournalLineInput {
    fn from(line: JournalLineRequest) -> Self {
        JournalLineInput {
            account_id: line.account_id,
            description: line.description,
            debit_cents: line.debit_cents,
            credit_cents: line.credit_cents,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    pub entry_date: NaiveDate,
    /// Defaults to the month of `entry_date`
    pub fiscal_period: Option<String>,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<JournalLineRequest>,
}

/// Detail edits apply to drafts only; `status` posts or reverses
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEntryRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub reference: Option<Option<String>>,
    #[validate(length(min = 1, max = 1000))]
    pub description: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub fiscal_period: Option<String>,
    #[validate(length(min = 1), nested)]
    pub lines: Option<Vec<JournalLineRequest>>,
    pub status: Option<JournalStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryFilter {
    pub status: Option<JournalStatus>,
    pub fiscal_period: Option<String>,
}

#[derive(Serialize)]
pub struct ReversalResponse {
    pub original: EntryWithLines,
    pub reversal: EntryWithLines,
}

pub async fn list_entries(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<EntryFilter>,
) -> Result<Json<Page<JournalEntry>>> {
    Ok(Json(
        repo.list_entries(
            auth.org_id,
            filter.status,
            filter.fiscal_period,
            pagination.page(),
        )
        .await?,
    ))
}

/// Create a draft entry; balance is checked when it is posted
pub async fn create_entry(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateEntryRequest>,
) -> Result<(StatusCode, Json<EntryWithLines>)> {
    let entry = repo
        .create_entry(
            auth.org_id,
            auth.person_id,
            NewEntry {
                reference: request.reference,
                description: request.description,
                entry_date: request.entry_date,
                fiscal_period: request.fiscal_period,
                lines: request.lines.into_iter().map(Into::into).collect(),
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        entry_id = %entry.entry.id,
        lines = entry.lines.len(),
        "Journal entry drafted"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_entry(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryWithLines>> {
    Ok(Json(repo.find_entry(auth.org_id, id).await?))
}

/// Edit a draft, or move it along its lifecycle.
///
/// `{"status": "posted"}` posts and `{"status": "reversed"}` reverses; both
/// need a manager. The reversal answer is the original entry, now linked to
/// the reversing one through `reversed_by_entry_id`.
pub async fn update_entry(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateEntryRequest>,
) -> Result<Json<EntryWithLines>> {
    let status = request.status;
    let changes = EntryChanges {
        reference: request.reference,
        description: request.description,
        entry_date: request.entry_date,
        fiscal_period: request.fiscal_period,
        lines: request
            .lines
            .map(|lines| lines.into_iter().map(Into::into).collect()),
    };

    match status {
        None | Some(JournalStatus::Draft) => {
            let entry = if changes.is_empty() {
                repo.find_entry(auth.org_id, id).await?
            } else {
                repo.update_draft_entry(auth.org_id, id, changes).await?
            };
            if status.is_some() && entry.entry.status != JournalStatus::Draft {
                return Err(AppError::InvalidTransition {
                    entity: JournalStatus::ENTITY,
                    from: entry.entry.status.label(),
                    to: JournalStatus::Draft.label(),
                });
            }
            tracing::info!(org_id = %auth.org_id, entry_id = %id, "Journal entry updated");
            Ok(Json(entry))
        }
        Some(JournalStatus::Posted) => {
            auth.require_manager()?;
            let posted = repo
                .update_and_post_entry(auth.org_id, id, auth.person_id, changes)
                .await?;
            tracing::info!(org_id = %auth.org_id, entry_id = %id, "Journal entry posted");
            Ok(Json(posted))
        }
        Some(JournalStatus::Reversed) => {
            auth.require_manager()?;
            if !changes.is_empty() {
                return Err(AppError::Validation {
                    message: "A reversal cannot change the entry's details".to_string(),
                    field: None,
                });
            }
            let (original, reversal) = repo.reverse_entry(auth.org_id, id, auth.person_id).await?;
            tracing::info!(
                org_id = %auth.org_id,
                entry_id = %id,
                reversal_id = %reversal.entry.id,
                "Journal entry reversed"
            );
            Ok(Json(original))
        }
    }
}

pub async fn post_entry(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryWithLines>> {
    auth.require_manager()?;
    let posted = repo.post_entry(auth.org_id, id, auth.person_id).await?;
    tracing::info!(org_id = %auth.org_id, entry_id = %id, "Journal entry posted");
    Ok(Json(posted))
}

pub async fn reverse_entry(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ReversalResponse>)> {
    auth.require_manager()?;
    let (original, reversal) = repo.reverse_entry(auth.org_id, id, auth.person_id).await?;
    tracing::info!(
        org_id = %auth.org_id,
        entry_id = %id,
        reversal_id = %reversal.entry.id,
        "Journal entry reversed"
    );
    Ok((
        StatusCode::CREATED,
        Json(ReversalResponse { original, reversal }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrialBalanceQuery {
    pub fiscal_period: Option<String>,
}

pub async fn trial_balance(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(query): QueryParams<TrialBalanceQuery>,
) -> Result<Json<TrialBalance>> {
    Ok(Json(
        repo.trial_balance(auth.org_id, query.fiscal_period).await?,
    ))
}
