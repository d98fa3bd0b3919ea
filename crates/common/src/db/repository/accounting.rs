use super::{ensure_applied, now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::ledger::{self, TrialBalance};
use crate::domain::Lifecycle;
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
}

#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct JournalLineInput {
    pub account_id: Uuid,
    pub description: Option<String>,
    pub debit_cents: i64,
    pub credit_cents: i64,
}

impl ledger::PostingLine for JournalLineInput {
    fn debit_cents(&self) -> i64 {
        self.debit_cents
    }

    fn credit_cents(&self) -> i64 {
        self.credit_cents
    }
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub reference: Option<String>,
    pub description: String,
    pub entry_date: NaiveDate,
    /// Defaults to the month of `entry_date`
    pub fiscal_period: Option<String>,
    pub lines: Vec<JournalLineInput>,
}

/// Edits allowed on a draft; `lines` replaces every line
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub reference: Option<Option<String>>,
    pub description: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub fiscal_period: Option<String>,
    pub lines: Option<Vec<JournalLineInput>>,
}

impl EntryChanges {
    pub fn is_empty(&self) -> bool {
        self.reference.is_none()
            && self.description.is_none()
            && self.entry_date.is_none()
            && self.fiscal_period.is_none()
            && self.lines.is_none()
    }
}

/// A journal entry with its lines and totals
#[derive(Debug, Clone, Serialize)]
pub struct EntryWithLines {
    #[serde(flatten)]
    pub entry: JournalEntry,
    pub lines: Vec<JournalEntryLine>,
    pub total_debit_cents: i64,
    pub total_credit_cents: i64,
    pub is_balanced: bool,
}

impl EntryWithLines {
    fn new(entry: JournalEntry, lines: Vec<JournalEntryLine>) -> Self {
        let (total_debit_cents, total_credit_cents) = ledger::totals(&lines).unwrap_or((0, 0));
        Self {
            is_balanced: lines.len() >= 2 && total_debit_cents == total_credit_cents,
            entry,
            lines,
            total_debit_cents,
            total_credit_cents,
        }
    }
}

fn line_models(
    org_id: Uuid,
    entry_id: Uuid,
    lines: &[JournalLineInput],
) -> Vec<JournalEntryLineActiveModel> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| JournalEntryLineActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            entry_id: Set(entry_id),
            line_index: Set(index as i32),
            account_id: Set(line.account_id),
            description: Set(line.description.clone()),
            debit_cents: Set(line.debit_cents),
            credit_cents: Set(line.credit_cents),
        })
        .collect()
}

async fn entry_lines<C: ConnectionTrait>(conn: &C, entry_id: Uuid) -> Result<Vec<JournalEntryLine>> {
    JournalEntryLineEntity::find()
        .filter(JournalEntryLineColumn::EntryId.eq(entry_id))
        .order_by_asc(JournalEntryLineColumn::LineIndex)
        .all(conn)
        .await
        .map_err(Into::into)
}

async fn find_entry_in<C: ConnectionTrait>(
    conn: &C,
    org_id: Uuid,
    id: Uuid,
) -> Result<JournalEntry> {
    JournalEntryEntity::find_by_id(id)
        .filter(JournalEntryColumn::OrgId.eq(org_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("journal entry", id))
}

fn ensure_draft(entry: &JournalEntry) -> Result<()> {
    if entry.status == JournalStatus::Draft {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: format!(
                "Journal entry is {} and can no longer be edited",
                entry.status.label()
            ),
            field: Some("status".to_string()),
        })
    }
}

/// Write draft edits, guarded on the entry still being a draft
async fn apply_draft_changes<C: ConnectionTrait>(
    conn: &C,
    org_id: Uuid,
    id: Uuid,
    changes: EntryChanges,
) -> Result<()> {
    let mut update = JournalEntryActiveModel {
        updated_at: Set(now()),
        ..Default::default()
    };
    if let Some(reference) = changes.reference {
        update.reference = Set(reference);
    }
    if let Some(description) = changes.description {
        update.description = Set(description);
    }
    match (changes.entry_date, changes.fiscal_period) {
        (_, Some(period)) => {
            update.fiscal_period = Set(period);
            if let Some(date) = changes.entry_date {
                update.entry_date = Set(date);
            }
        }
        // moving the date moves the default period with it
        (Some(date), None) => {
            update.entry_date = Set(date);
            update.fiscal_period = Set(ledger::fiscal_period_of(date));
        }
        (None, None) => {}
    }

    let result = JournalEntryEntity::update_many()
        .set(update)
        .filter(JournalEntryColumn::Id.eq(id))
        .filter(JournalEntryColumn::OrgId.eq(org_id))
        .filter(JournalEntryColumn::Status.eq(JournalStatus::Draft))
        .exec(conn)
        .await?;
    ensure_applied(result.rows_affected, "journal entry")?;

    if let Some(ref lines) = changes.lines {
        JournalEntryLineEntity::delete_many()
            .filter(JournalEntryLineColumn::EntryId.eq(id))
            .exec(conn)
            .await?;
        JournalEntryLineEntity::insert_many(line_models(org_id, id, lines))
            .exec(conn)
            .await?;
    }
    Ok(())
}

impl Repository {
    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Create an account; the code is unique per organization
    pub async fn create_account(&self, org_id: Uuid, account: NewAccount) -> Result<Account> {
        ledger::validate_account_code(&account.code)?;

        let taken = AccountEntity::find()
            .filter(AccountColumn::OrgId.eq(org_id))
            .filter(AccountColumn::Code.eq(account.code.as_str()))
            .one(self.write_conn())
            .await?;
        if taken.is_some() {
            return Err(AppError::Duplicate {
                message: format!("Account code '{}' already exists", account.code),
            });
        }

        let now = now();
        AccountActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            code: Set(account.code),
            name: Set(account.name),
            account_type: Set(account.account_type),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find an account by ID
    pub async fn find_account(&self, org_id: Uuid, id: Uuid) -> Result<Account> {
        AccountEntity::find_by_id(id)
            .filter(AccountColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("account", id))
    }

    /// List the chart of accounts ordered by code
    pub async fn list_accounts(
        &self,
        org_id: Uuid,
        is_active: Option<bool>,
        account_type: Option<AccountType>,
        page: PageRequest,
    ) -> Result<Page<Account>> {
        let mut select = AccountEntity::find().filter(AccountColumn::OrgId.eq(org_id));
        if let Some(is_active) = is_active {
            select = select.filter(AccountColumn::IsActive.eq(is_active));
        }
        if let Some(account_type) = account_type {
            select = select.filter(AccountColumn::AccountType.eq(account_type));
        }
        paginate(self.read_conn(), select.order_by_asc(AccountColumn::Code), page).await
    }

    /// Rename or (de)activate an account. The code never changes.
    pub async fn update_account(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Account> {
        let account = AccountEntity::find_by_id(id)
            .filter(AccountColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("account", id))?;

        let mut active: AccountActiveModel = account.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(now());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Check each line and that every account is an active account of the org
    async fn validate_entry_lines(&self, org_id: Uuid, lines: &[JournalLineInput]) -> Result<()> {
        if lines.is_empty() {
            return Err(AppError::invalid_field("lines", "an entry needs at least one line"));
        }
        for (index, line) in lines.iter().enumerate() {
            ledger::validate_line(index, line)?;
        }
        ledger::totals(lines)?;

        let wanted: HashSet<Uuid> = lines.iter().map(|l| l.account_id).collect();
        let usable: HashSet<Uuid> = AccountEntity::find()
            .select_only()
            .column(AccountColumn::Id)
            .filter(AccountColumn::OrgId.eq(org_id))
            .filter(AccountColumn::IsActive.eq(true))
            .filter(AccountColumn::Id.is_in(wanted.iter().copied()))
            .into_tuple::<Uuid>()
            .all(self.read_conn())
            .await?
            .into_iter()
            .collect();

        if let Some((index, line)) = lines
            .iter()
            .enumerate()
            .find(|(_, l)| !usable.contains(&l.account_id))
        {
            return Err(AppError::invalid_field(
                "lines",
                format!("line {}: account {} is not an active account", index, line.account_id),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Journal Entry Operations
    // ========================================================================

    /// Create a draft entry with its lines. Drafts may be unbalanced.
    pub async fn create_entry(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        entry: NewEntry,
    ) -> Result<EntryWithLines> {
        let fiscal_period = entry
            .fiscal_period
            .unwrap_or_else(|| ledger::fiscal_period_of(entry.entry_date));
        ledger::validate_fiscal_period(&fiscal_period)?;
        self.validate_entry_lines(org_id, &entry.lines).await?;

        let now = now();
        let entry_id = Uuid::new_v4();

        let txn = self.write_conn().begin().await?;

        JournalEntryActiveModel {
            id: Set(entry_id),
            org_id: Set(org_id),
            reference: Set(entry.reference),
            description: Set(entry.description),
            entry_date: Set(entry.entry_date),
            fiscal_period: Set(fiscal_period),
            status: Set(JournalStatus::Draft),
            posted_by: Set(None),
            posted_at: Set(None),
            reverses_entry_id: Set(None),
            reversed_by_entry_id: Set(None),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        JournalEntryLineEntity::insert_many(line_models(org_id, entry_id, &entry.lines))
            .exec(&txn)
            .await?;

        let created = find_entry_in(&txn, org_id, entry_id).await?;
        let lines = entry_lines(&txn, entry_id).await?;
        txn.commit().await?;

        info!(org_id = %org_id, entry_id = %entry_id, lines = lines.len(), "Journal entry drafted");
        Ok(EntryWithLines::new(created, lines))
    }

    /// Find an entry with its lines
    pub async fn find_entry(&self, org_id: Uuid, id: Uuid) -> Result<EntryWithLines> {
        let entry = find_entry_in(self.read_conn(), org_id, id).await?;
        let lines = entry_lines(self.read_conn(), id).await?;
        Ok(EntryWithLines::new(entry, lines))
    }

    /// List entry headers, newest entry date first
    pub async fn list_entries(
        &self,
        org_id: Uuid,
        status: Option<JournalStatus>,
        fiscal_period: Option<String>,
        page: PageRequest,
    ) -> Result<Page<JournalEntry>> {
        let mut select = JournalEntryEntity::find().filter(JournalEntryColumn::OrgId.eq(org_id));
        if let Some(status) = status {
            select = select.filter(JournalEntryColumn::Status.eq(status));
        }
        if let Some(period) = fiscal_period {
            select = select.filter(JournalEntryColumn::FiscalPeriod.eq(period));
        }
        let select = select
            .order_by_desc(JournalEntryColumn::EntryDate)
            .order_by_desc(JournalEntryColumn::CreatedAt);
        paginate(self.read_conn(), select, page).await
    }

    /// Edit a draft. Posted and reversed entries are immutable.
    pub async fn update_draft_entry(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: EntryChanges,
    ) -> Result<EntryWithLines> {
        let entry = find_entry_in(self.write_conn(), org_id, id).await?;
        ensure_draft(&entry)?;
        self.validate_entry_changes(org_id, &changes).await?;

        let txn = self.write_conn().begin().await?;

        apply_draft_changes(&txn, org_id, id, changes).await?;

        let updated = find_entry_in(&txn, org_id, id).await?;
        let lines = entry_lines(&txn, id).await?;
        txn.commit().await?;

        Ok(EntryWithLines::new(updated, lines))
    }

    /// Post a balanced draft.
    ///
    /// The status flip is conditional on the entry still being a draft, so of
    /// two concurrent posters exactly one wins; the other gets `Conflict`.
    pub async fn post_entry(&self, org_id: Uuid, id: Uuid, actor: Uuid) -> Result<EntryWithLines> {
        self.update_and_post_entry(org_id, id, actor, EntryChanges::default())
            .await
    }

    /// Apply draft edits and post the result in one transaction.
    ///
    /// The balance check runs on the edited lines; when it or the status
    /// guard fails, the edits are rolled back with the transaction.
    pub async fn update_and_post_entry(
        &self,
        org_id: Uuid,
        id: Uuid,
        actor: Uuid,
        changes: EntryChanges,
    ) -> Result<EntryWithLines> {
        self.validate_entry_changes(org_id, &changes).await?;

        let txn = self.write_conn().begin().await?;

        let entry = find_entry_in(&txn, org_id, id).await?;
        if entry.status != JournalStatus::Draft {
            metrics::record_transition_rejected(JournalStatus::ENTITY);
            return Err(AppError::InvalidTransition {
                entity: JournalStatus::ENTITY,
                from: entry.status.label(),
                to: JournalStatus::Posted.label(),
            });
        }

        if !changes.is_empty() {
            apply_draft_changes(&txn, org_id, id, changes).await?;
        }

        let lines = entry_lines(&txn, id).await?;
        ledger::ensure_balanced(&lines)?;

        let now = now();
        let result = JournalEntryEntity::update_many()
            .set(JournalEntryActiveModel {
                status: Set(JournalStatus::Posted),
                posted_by: Set(Some(actor)),
                posted_at: Set(Some(now)),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(JournalEntryColumn::Id.eq(id))
            .filter(JournalEntryColumn::OrgId.eq(org_id))
            .filter(JournalEntryColumn::Status.eq(JournalStatus::Draft))
            .exec(&txn)
            .await?;
        ensure_applied(result.rows_affected, "journal entry")?;

        let posted = find_entry_in(&txn, org_id, id).await?;
        txn.commit().await?;

        metrics::record_journal_posted();
        metrics::record_transition(JournalStatus::ENTITY, JournalStatus::Posted.label());
        info!(org_id = %org_id, entry_id = %id, "Journal entry posted");

        Ok(EntryWithLines::new(posted, lines))
    }

    /// Checks on draft edits that need no lock on the entry
    async fn validate_entry_changes(&self, org_id: Uuid, changes: &EntryChanges) -> Result<()> {
        if let Some(ref period) = changes.fiscal_period {
            ledger::validate_fiscal_period(period)?;
        }
        if let Some(ref lines) = changes.lines {
            self.validate_entry_lines(org_id, lines).await?;
        }
        Ok(())
    }

    /// Reverse a posted entry.
    ///
    /// In one transaction: write a posted entry with every line's debit and
    /// credit swapped, then mark the original reversed and link the two.
    /// Returns `(original, reversal)`.
    pub async fn reverse_entry(
        &self,
        org_id: Uuid,
        id: Uuid,
        actor: Uuid,
    ) -> Result<(EntryWithLines, EntryWithLines)> {
        let txn = self.write_conn().begin().await?;

        let original = find_entry_in(&txn, org_id, id).await?;
        if original.status != JournalStatus::Posted {
            metrics::record_transition_rejected(JournalStatus::ENTITY);
            return Err(AppError::InvalidTransition {
                entity: JournalStatus::ENTITY,
                from: original.status.label(),
                to: JournalStatus::Reversed.label(),
            });
        }
        if original.is_reversal() {
            return Err(AppError::Validation {
                message: "A reversal entry cannot itself be reversed".to_string(),
                field: Some("status".to_string()),
            });
        }

        let original_lines = entry_lines(&txn, id).await?;
        let swapped: Vec<JournalLineInput> = original_lines
            .iter()
            .zip(ledger::reversal_amounts(&original_lines))
            .map(|(line, amounts)| JournalLineInput {
                account_id: line.account_id,
                description: line.description.clone(),
                debit_cents: amounts.debit_cents,
                credit_cents: amounts.credit_cents,
            })
            .collect();

        let now = now();
        let reversal_id = Uuid::new_v4();

        JournalEntryActiveModel {
            id: Set(reversal_id),
            org_id: Set(org_id),
            reference: Set(original.reference.clone()),
            description: Set(format!("Reversal of {}", original.description)),
            entry_date: Set(original.entry_date),
            fiscal_period: Set(original.fiscal_period.clone()),
            status: Set(JournalStatus::Posted),
            posted_by: Set(Some(actor)),
            posted_at: Set(Some(now)),
            reverses_entry_id: Set(Some(id)),
            reversed_by_entry_id: Set(None),
            created_by: Set(actor),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        JournalEntryLineEntity::insert_many(line_models(org_id, reversal_id, &swapped))
            .exec(&txn)
            .await?;

        let result = JournalEntryEntity::update_many()
            .set(JournalEntryActiveModel {
                status: Set(JournalStatus::Reversed),
                reversed_by_entry_id: Set(Some(reversal_id)),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(JournalEntryColumn::Id.eq(id))
            .filter(JournalEntryColumn::OrgId.eq(org_id))
            .filter(JournalEntryColumn::Status.eq(JournalStatus::Posted))
            .exec(&txn)
            .await?;
        ensure_applied(result.rows_affected, "journal entry")?;

        let original = find_entry_in(&txn, org_id, id).await?;
        let reversal = find_entry_in(&txn, org_id, reversal_id).await?;
        let reversal_lines = entry_lines(&txn, reversal_id).await?;
        txn.commit().await?;

        metrics::record_journal_reversed();
        metrics::record_transition(JournalStatus::ENTITY, JournalStatus::Reversed.label());
        info!(org_id = %org_id, entry_id = %id, reversal_id = %reversal_id, "Journal entry reversed");

        Ok((
            EntryWithLines::new(original, original_lines),
            EntryWithLines::new(reversal, reversal_lines),
        ))
    }

    /// Per-account totals over posted and reversed entries
    pub async fn trial_balance(
        &self,
        org_id: Uuid,
        fiscal_period: Option<String>,
    ) -> Result<TrialBalance> {
        if let Some(ref period) = fiscal_period {
            ledger::validate_fiscal_period(period)?;
        }

        let mut lines = JournalEntryLineEntity::find()
            .inner_join(JournalEntryEntity)
            .filter(JournalEntryLineColumn::OrgId.eq(org_id))
            .filter(
                JournalEntryColumn::Status.is_in([JournalStatus::Posted, JournalStatus::Reversed]),
            );
        if let Some(ref period) = fiscal_period {
            lines = lines.filter(JournalEntryColumn::FiscalPeriod.eq(period.as_str()));
        }
        let lines = lines.all(self.read_conn()).await?;

        let accounts = AccountEntity::find()
            .filter(AccountColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await?;

        Ok(ledger::trial_balance(&accounts, &lines, fiscal_period))
    }
}
