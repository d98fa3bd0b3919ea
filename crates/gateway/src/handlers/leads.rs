//! Commercial pipeline handlers

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
        models::{Lead, LeadStatus},
        LeadChanges, NewLead, Page, Repository,
    },
    domain::reports::{lead_pipeline, LeadPipelineSummary},
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLeadRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub estimated_value_cents: i64,
    pub notes: Option<String>,
    pub owner_person_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLeadRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub source: Option<Option<String>>,
    #[validate(range(min = 0))]
    pub estimated_value_cents: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub owner_person_id: Option<Option<Uuid>>,
    pub status: Option<LeadStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
}

pub async fn list_leads(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<LeadFilter>,
) -> Result<Json<Page<Lead>>> {
    Ok(Json(
        repo.list_leads(auth.org_id, filter.status, pagination.page())
            .await?,
    ))
}

pub async fn create_lead(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>)> {
    let lead = repo
        .create_lead(
            auth.org_id,
            NewLead {
                name: request.name,
                email: request.email,
                phone: request.phone,
                company: request.company,
                source: request.source,
                estimated_value_cents: request.estimated_value_cents,
                notes: request.notes,
                owner_person_id: request.owner_person_id,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, lead_id = %lead.id, "Lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn get_lead(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Lead>> {
    Ok(Json(repo.find_lead(auth.org_id, id).await?))
}

pub async fn update_lead(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateLeadRequest>,
) -> Result<Json<Lead>> {
    let lead = repo
        .update_lead(
            auth.org_id,
            id,
            LeadChanges {
                name: request.name,
                email: request.email,
                phone: request.phone,
                company: request.company,
                source: request.source,
                estimated_value_cents: request.estimated_value_cents,
                notes: request.notes,
                owner_person_id: request.owner_person_id,
                status: request.status,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        lead_id = %id,
        status = ?lead.status,
        "Lead updated"
    );
    Ok(Json(lead))
}

/// Counts per status, pipeline value and conversion rate
pub async fn lead_summary(
    State(repo): State<Repository>,
    auth: AuthContext,
) -> Result<Json<LeadPipelineSummary>> {
    let leads = repo.all_leads(auth.org_id).await?;
    Ok(Json(lead_pipeline(&leads)))
}
