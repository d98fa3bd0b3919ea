//! Support ticket handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::Pagination;
use crate::extract::{double_option, QueryParams, ValidJson};
use campusdesk_common::{
    auth::AuthContext,
    db::{
        models::{Ticket, TicketPriority, TicketStatus},
        NewTicket, Page, Repository, TicketChanges,
    },
    domain::reports::{ticket_summary, TicketSummary},
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 10000))]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: TicketPriority,
    pub assignee_person_id: Option<Uuid>,
}

fn default_priority() -> TicketPriority {
    TicketPriority::Normal
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_person_id: Option<Option<Uuid>>,
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assignee_person_id: Option<Uuid>,
}

pub async fn list_tickets(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<TicketFilter>,
) -> Result<Json<Page<Ticket>>> {
    Ok(Json(
        repo.list_tickets(
            auth.org_id,
            filter.status,
            filter.priority,
            filter.assignee_person_id,
            pagination.page(),
        )
        .await?,
    ))
}

/// Open a ticket; the caller is the requester
pub async fn create_ticket(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>)> {
    let ticket = repo
        .create_ticket(
            auth.org_id,
            auth.person_id,
            NewTicket {
                subject: request.subject,
                description: request.description,
                priority: request.priority,
                assignee_person_id: request.assignee_person_id,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        ticket_id = %ticket.id,
        priority = ?ticket.priority,
        "Ticket opened"
    );
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>> {
    Ok(Json(repo.find_ticket(auth.org_id, id).await?))
}

pub async fn update_ticket(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateTicketRequest>,
) -> Result<Json<Ticket>> {
    let ticket = repo
        .update_ticket(
            auth.org_id,
            id,
            TicketChanges {
                subject: request.subject,
                description: request.description,
                priority: request.priority,
                assignee_person_id: request.assignee_person_id,
                status: request.status,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, ticket_id = %id, "Ticket updated");
    Ok(Json(ticket))
}

/// Counts per status and priority
pub async fn tickets_summary(
    State(repo): State<Repository>,
    auth: AuthContext,
) -> Result<Json<TicketSummary>> {
    let tickets = repo.all_tickets(auth.org_id).await?;
    Ok(Json(ticket_summary(&tickets)))
}
