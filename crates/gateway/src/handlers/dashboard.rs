//! Organization dashboard

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use campusdesk_common::{
    auth::AuthContext,
    db::{models::MeetingApproval, Repository},
    domain::reports::{
        invoice_summary, kaizen_summary, lead_pipeline, obligation_summary, ticket_summary,
        InvoiceSummary, KaizenSummary, LeadPipelineSummary, ObligationSummary, TicketSummary,
    },
    errors::Result,
};

#[derive(Serialize)]
pub struct DashboardResponse {
    pub leads: LeadPipelineSummary,
    pub invoices: InvoiceSummary,
    pub obligations: ObligationSummary,
    pub kaizen: KaizenSummary,
    pub pending_meetings: u64,
    pub tickets: TicketSummary,
}

/// One snapshot across modules, fetched concurrently
pub async fn dashboard(
    State(repo): State<Repository>,
    auth: AuthContext,
) -> Result<Json<DashboardResponse>> {
    let org_id = auth.org_id;
    let (leads, invoices, obligations, suggestions, pending_meetings, tickets) = futures::try_join!(
        repo.all_leads(org_id),
        repo.all_invoices(org_id),
        repo.all_obligations(org_id),
        repo.all_suggestions(org_id),
        repo.count_meetings(org_id, MeetingApproval::Pending),
        repo.all_tickets(org_id),
    )?;

    Ok(Json(DashboardResponse {
        leads: lead_pipeline(&leads),
        invoices: invoice_summary(&invoices, Utc::now().date_naive()),
        obligations: obligation_summary(&obligations),
        kaizen: kaizen_summary(&suggestions),
        pending_meetings,
        tickets: ticket_summary(&tickets),
    }))
}
