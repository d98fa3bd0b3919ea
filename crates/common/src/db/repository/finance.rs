use super::{ensure_applied, now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::finance::{net_amount, validate_due_date};
use crate::domain::{record_status_change, resolve_status};
use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub number: String,
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub customer_name: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub gross_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub notes: Option<Option<String>>,
    pub status: Option<FinancialStatus>,
}

impl InvoiceChanges {
    fn touches_amounts(&self) -> bool {
        self.gross_cents.is_some()
            || self.discount_cents.is_some()
            || self.issue_date.is_some()
            || self.due_date.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewObligation {
    pub kind: ObligationKind,
    pub counterparty: String,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ObligationChanges {
    pub counterparty: Option<String>,
    pub description: Option<Option<String>>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<FinancialStatus>,
}

impl Repository {
    // ========================================================================
    // Invoice Operations
    // ========================================================================

    /// Create a draft invoice; the number is unique per organization
    pub async fn create_invoice(&self, org_id: Uuid, invoice: NewInvoice) -> Result<Invoice> {
        let net_cents = net_amount(invoice.gross_cents, invoice.discount_cents)?;
        validate_due_date(invoice.issue_date, invoice.due_date)?;

        let taken = InvoiceEntity::find()
            .filter(InvoiceColumn::OrgId.eq(org_id))
            .filter(InvoiceColumn::Number.eq(invoice.number.as_str()))
            .one(self.write_conn())
            .await?;
        if taken.is_some() {
            return Err(AppError::Duplicate {
                message: format!("Invoice number '{}' already exists", invoice.number),
            });
        }

        let now = now();
        InvoiceActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            number: Set(invoice.number),
            customer_name: Set(invoice.customer_name),
            issue_date: Set(invoice.issue_date),
            due_date: Set(invoice.due_date),
            gross_cents: Set(invoice.gross_cents),
            discount_cents: Set(invoice.discount_cents),
            net_cents: Set(net_cents),
            status: Set(FinancialStatus::Draft),
            paid_at: Set(None),
            notes: Set(invoice.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find an invoice by ID
    pub async fn find_invoice(&self, org_id: Uuid, id: Uuid) -> Result<Invoice> {
        InvoiceEntity::find_by_id(id)
            .filter(InvoiceColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("invoice", id))
    }

    /// List invoices, latest issue date first
    pub async fn list_invoices(
        &self,
        org_id: Uuid,
        status: Option<FinancialStatus>,
        page: PageRequest,
    ) -> Result<Page<Invoice>> {
        let mut select = InvoiceEntity::find().filter(InvoiceColumn::OrgId.eq(org_id));
        if let Some(status) = status {
            select = select.filter(InvoiceColumn::Status.eq(status));
        }
        let select = select
            .order_by_desc(InvoiceColumn::IssueDate)
            .order_by_desc(InvoiceColumn::CreatedAt);
        paginate(self.read_conn(), select, page).await
    }

    /// Every invoice of the organization, for summaries
    pub async fn all_invoices(&self, org_id: Uuid) -> Result<Vec<Invoice>> {
        InvoiceEntity::find()
            .filter(InvoiceColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply changes. Amounts and dates are editable only while draft.
    pub async fn update_invoice(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: InvoiceChanges,
    ) -> Result<Invoice> {
        let invoice = InvoiceEntity::find_by_id(id)
            .filter(InvoiceColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("invoice", id))?;

        if changes.touches_amounts() && invoice.status != FinancialStatus::Draft {
            return Err(AppError::Validation {
                message: "Amounts and dates can only change while the invoice is a draft"
                    .to_string(),
                field: Some("status".to_string()),
            });
        }

        let gross = changes.gross_cents.unwrap_or(invoice.gross_cents);
        let discount = changes.discount_cents.unwrap_or(invoice.discount_cents);
        let net = net_amount(gross, discount)?;
        validate_due_date(
            changes.issue_date.unwrap_or(invoice.issue_date),
            changes.due_date.unwrap_or(invoice.due_date),
        )?;

        let next_status = resolve_status(invoice.status, changes.status)?;

        let now = now();
        let mut update = InvoiceActiveModel {
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(name) = changes.customer_name {
            update.customer_name = Set(name);
        }
        if let Some(date) = changes.issue_date {
            update.issue_date = Set(date);
        }
        if let Some(date) = changes.due_date {
            update.due_date = Set(date);
        }
        if changes.gross_cents.is_some() || changes.discount_cents.is_some() {
            update.gross_cents = Set(gross);
            update.discount_cents = Set(discount);
            update.net_cents = Set(net);
        }
        if let Some(notes) = changes.notes {
            update.notes = Set(notes);
        }
        if let Some(status) = next_status {
            update.status = Set(status);
            if status == FinancialStatus::Paid {
                update.paid_at = Set(Some(now));
            }
        }

        let result = InvoiceEntity::update_many()
            .set(update)
            .filter(InvoiceColumn::Id.eq(id))
            .filter(InvoiceColumn::OrgId.eq(org_id))
            .filter(InvoiceColumn::Status.eq(invoice.status))
            .exec(self.write_conn())
            .await?;
        ensure_applied(result.rows_affected, "invoice")?;
        record_status_change(next_status);

        if let Some(status) = next_status {
            info!(org_id = %org_id, invoice_id = %id, status = ?status, "Invoice status changed");
        }

        InvoiceEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("invoice", id))
    }

    // ========================================================================
    // Receivable / Payable Operations
    // ========================================================================

    /// Create a pending receivable or payable
    pub async fn create_obligation(
        &self,
        org_id: Uuid,
        obligation: NewObligation,
    ) -> Result<Obligation> {
        if obligation.amount_cents <= 0 {
            return Err(AppError::invalid_field("amount_cents", "must be positive"));
        }
        if let Some(invoice_id) = obligation.invoice_id {
            let invoice = InvoiceEntity::find_by_id(invoice_id)
                .filter(InvoiceColumn::OrgId.eq(org_id))
                .one(self.read_conn())
                .await?;
            if invoice.is_none() {
                return Err(AppError::invalid_field(
                    "invoice_id",
                    format!("invoice {} does not exist", invoice_id),
                ));
            }
        }

        let now = now();
        ObligationActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            kind: Set(obligation.kind),
            counterparty: Set(obligation.counterparty),
            description: Set(obligation.description),
            amount_cents: Set(obligation.amount_cents),
            due_date: Set(obligation.due_date),
            status: Set(FinancialStatus::Pending),
            invoice_id: Set(obligation.invoice_id),
            settled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find an obligation by ID
    pub async fn find_obligation(&self, org_id: Uuid, id: Uuid) -> Result<Obligation> {
        ObligationEntity::find_by_id(id)
            .filter(ObligationColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("obligation", id))
    }

    /// List obligations, earliest due first
    pub async fn list_obligations(
        &self,
        org_id: Uuid,
        kind: Option<ObligationKind>,
        status: Option<FinancialStatus>,
        page: PageRequest,
    ) -> Result<Page<Obligation>> {
        let mut select = ObligationEntity::find().filter(ObligationColumn::OrgId.eq(org_id));
        if let Some(kind) = kind {
            select = select.filter(ObligationColumn::Kind.eq(kind));
        }
        if let Some(status) = status {
            select = select.filter(ObligationColumn::Status.eq(status));
        }
        paginate(
            self.read_conn(),
            select.order_by_asc(ObligationColumn::DueDate),
            page,
        )
        .await
    }

    /// Every obligation of the organization, for summaries
    pub async fn all_obligations(&self, org_id: Uuid) -> Result<Vec<Obligation>> {
        ObligationEntity::find()
            .filter(ObligationColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply changes; `paid` stamps `settled_at`
    pub async fn update_obligation(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: ObligationChanges,
    ) -> Result<Obligation> {
        let obligation = ObligationEntity::find_by_id(id)
            .filter(ObligationColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("obligation", id))?;

        if changes.amount_cents.is_some_and(|a| a <= 0) {
            return Err(AppError::invalid_field("amount_cents", "must be positive"));
        }
        if changes.amount_cents.is_some()
            && matches!(obligation.status, FinancialStatus::Paid | FinancialStatus::Cancelled)
        {
            return Err(AppError::Validation {
                message: "A settled or cancelled obligation cannot change amount".to_string(),
                field: Some("amount_cents".to_string()),
            });
        }

        let next_status = resolve_status(obligation.status, changes.status)?;

        let now = now();
        let mut update = ObligationActiveModel {
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(counterparty) = changes.counterparty {
            update.counterparty = Set(counterparty);
        }
        if let Some(description) = changes.description {
            update.description = Set(description);
        }
        if let Some(amount) = changes.amount_cents {
            update.amount_cents = Set(amount);
        }
        if let Some(due) = changes.due_date {
            update.due_date = Set(due);
        }
        if let Some(status) = next_status {
            update.status = Set(status);
            if status == FinancialStatus::Paid {
                update.settled_at = Set(Some(now));
            }
        }

        let result = ObligationEntity::update_many()
            .set(update)
            .filter(ObligationColumn::Id.eq(id))
            .filter(ObligationColumn::OrgId.eq(org_id))
            .filter(ObligationColumn::Status.eq(obligation.status))
            .exec(self.write_conn())
            .await?;
        ensure_applied(result.rows_affected, "obligation")?;
        record_status_change(next_status);

        ObligationEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("obligation", id))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn invoice(number: &str) -> NewInvoice {
        NewInvoice {
            number: number.into(),
            customer_name: "Parent Association".into(),
            issue_date: day(1),
            due_date: day(31),
            gross_cents: 50000,
            discount_cents: 5000,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_invoice_net_and_duplicate_number() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;

        let created = repo.create_invoice(t.org.id, invoice("INV-001")).await.unwrap();
        assert_eq!(created.net_cents, 45000);
        assert_eq!(created.status, FinancialStatus::Draft);

        assert!(matches!(
            repo.create_invoice(t.org.id, invoice("INV-001")).await,
            Err(AppError::Duplicate { .. })
        ));

        let mut bad = invoice("INV-002");
        bad.discount_cents = 60000;
        assert!(matches!(
            repo.create_invoice(t.org.id, bad).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoice_payment_flow() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let inv = repo.create_invoice(t.org.id, invoice("INV-001")).await.unwrap();

        let adjusted = repo
            .update_invoice(
                t.org.id,
                inv.id,
                InvoiceChanges {
                    discount_cents: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(adjusted.net_cents, 50000);

        assert!(matches!(
            repo.update_invoice(
                t.org.id,
                inv.id,
                InvoiceChanges {
                    status: Some(FinancialStatus::Paid),
                    ..Default::default()
                }
            )
            .await,
            Err(AppError::InvalidTransition { .. })
        ));

        let issued = repo
            .update_invoice(
                t.org.id,
                inv.id,
                InvoiceChanges {
                    status: Some(FinancialStatus::Pending),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(issued.paid_at.is_none());

        // amounts are frozen once issued
        assert!(repo
            .update_invoice(
                t.org.id,
                inv.id,
                InvoiceChanges {
                    gross_cents: Some(1),
                    ..Default::default()
                }
            )
            .await
            .is_err());

        let paid = repo
            .update_invoice(
                t.org.id,
                inv.id,
                InvoiceChanges {
                    status: Some(FinancialStatus::Paid),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, FinancialStatus::Paid);
        assert!(paid.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_obligation_invoice_must_be_same_org() {
        let repo = repo().await;
        let north = tenant(&repo, "north").await;
        let south = tenant(&repo, "south").await;
        let inv = repo.create_invoice(north.org.id, invoice("INV-001")).await.unwrap();

        let obligation = |invoice_id| NewObligation {
            kind: ObligationKind::Receivable,
            counterparty: "Parent Association".into(),
            description: None,
            amount_cents: 45000,
            due_date: day(31),
            invoice_id: Some(invoice_id),
        };

        assert!(matches!(
            repo.create_obligation(south.org.id, obligation(inv.id)).await,
            Err(AppError::Validation { .. })
        ));

        let created = repo.create_obligation(north.org.id, obligation(inv.id)).await.unwrap();
        assert_eq!(created.status, FinancialStatus::Pending);

        let settled = repo
            .update_obligation(
                north.org.id,
                created.id,
                ObligationChanges {
                    status: Some(FinancialStatus::Paid),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(settled.settled_at.is_some());

        assert!(matches!(
            repo.find_obligation(south.org.id, created.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
