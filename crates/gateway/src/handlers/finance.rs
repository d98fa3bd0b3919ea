//! Invoice and receivable/payable handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::Pagination;
use crate::extract::{double_option, QueryParams, ValidJson};
use campusdesk_common::{
    auth::AuthContext,
    db::{
        models::{FinancialStatus, Invoice, Obligation, ObligationKind},
        InvoiceChanges, NewInvoice, NewObligation, ObligationChanges, Page, Repository,
    },
    domain::reports::{invoice_summary, obligation_summary, InvoiceSummary, ObligationSummary},
    errors::Result,
};

// ============================================================================
// Invoices
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 50))]
    pub number: String,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(range(min = 0))]
    pub gross_cents: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub discount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub gross_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub discount_cents: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub status: Option<FinancialStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<FinancialStatus>,
}

pub async fn list_invoices(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<InvoiceFilter>,
) -> Result<Json<Page<Invoice>>> {
    Ok(Json(
        repo.list_invoices(auth.org_id, filter.status, pagination.page())
            .await?,
    ))
}

pub async fn create_invoice(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>)> {
    let invoice = repo
        .create_invoice(
            auth.org_id,
            NewInvoice {
                number: request.number,
                customer_name: request.customer_name,
                issue_date: request.issue_date,
                due_date: request.due_date,
                gross_cents: request.gross_cents,
                discount_cents: request.discount_cents,
                notes: request.notes,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        invoice_id = %invoice.id,
        number = %invoice.number,
        net_cents = invoice.net_cents,
        "Invoice created"
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>> {
    Ok(Json(repo.find_invoice(auth.org_id, id).await?))
}

pub async fn update_invoice(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateInvoiceRequest>,
) -> Result<Json<Invoice>> {
    let invoice = repo
        .update_invoice(
            auth.org_id,
            id,
            InvoiceChanges {
                customer_name: request.customer_name,
                issue_date: request.issue_date,
                due_date: request.due_date,
                gross_cents: request.gross_cents,
                discount_cents: request.discount_cents,
                notes: request.notes,
                status: request.status,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        invoice_id = %id,
        status = ?invoice.status,
        "Invoice updated"
    );
    Ok(Json(invoice))
}

pub async fn invoices_summary(
    State(repo): State<Repository>,
    auth: AuthContext,
) -> Result<Json<InvoiceSummary>> {
    let invoices = repo.all_invoices(auth.org_id).await?;
    Ok(Json(invoice_summary(&invoices, Utc::now().date_naive())))
}

// ============================================================================
// Obligations
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateObligationRequest {
    pub kind: ObligationKind,
    #[validate(length(min = 1, max = 200))]
    pub counterparty: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateObligationRequest {
    #[validate(length(min = 1, max = 200))]
    pub counterparty: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[validate(range(min = 1))]
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<FinancialStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObligationFilter {
    pub kind: Option<ObligationKind>,
    pub status: Option<FinancialStatus>,
}

pub async fn list_obligations(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<ObligationFilter>,
) -> Result<Json<Page<Obligation>>> {
    Ok(Json(
        repo.list_obligations(auth.org_id, filter.kind, filter.status, pagination.page())
            .await?,
    ))
}

pub async fn create_obligation(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateObligationRequest>,
) -> Result<(StatusCode, Json<Obligation>)> {
    let obligation = repo
        .create_obligation(
            auth.org_id,
            NewObligation {
                kind: request.kind,
                counterparty: request.counterparty,
                description: request.description,
                amount_cents: request.amount_cents,
                due_date: request.due_date,
                invoice_id: request.invoice_id,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        obligation_id = %obligation.id,
        kind = ?obligation.kind,
        "Obligation recorded"
    );
    Ok((StatusCode::CREATED, Json(obligation)))
}

pub async fn get_obligation(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Obligation>> {
    Ok(Json(repo.find_obligation(auth.org_id, id).await?))
}

pub async fn update_obligation(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateObligationRequest>,
) -> Result<Json<Obligation>> {
    let obligation = repo
        .update_obligation(
            auth.org_id,
            id,
            ObligationChanges {
                counterparty: request.counterparty,
                description: request.description,
                amount_cents: request.amount_cents,
                due_date: request.due_date,
                status: request.status,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        obligation_id = %id,
        status = ?obligation.status,
        "Obligation updated"
    );
    Ok(Json(obligation))
}

pub async fn obligations_summary(
    State(repo): State<Repository>,
    auth: AuthContext,
) -> Result<Json<ObligationSummary>> {
    let obligations = repo.all_obligations(auth.org_id).await?;
    Ok(Json(obligation_summary(&obligations)))
}
