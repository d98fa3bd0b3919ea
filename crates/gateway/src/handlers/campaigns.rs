//! Marketing campaign handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::Pagination;
use crate::extract::{double_option, QueryParams, ValidJson};
use campusdesk_common::{
    auth::AuthContext,
    db::{
        models::{Campaign, CampaignStatus},
        CampaignChanges, NewCampaign, Page, Repository,
    },
    domain::reports::{campaign_summary, CampaignSummary},
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub channel: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub budget_cents: i64,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub channel: Option<String>,
    #[validate(range(min = 0))]
    pub budget_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub spent_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub leads_generated: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub starts_on: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ends_on: Option<Option<NaiveDate>>,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignFilter {
    pub status: Option<CampaignStatus>,
}

pub async fn list_campaigns(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<CampaignFilter>,
) -> Result<Json<Page<Campaign>>> {
    Ok(Json(
        repo.list_campaigns(auth.org_id, filter.status, pagination.page())
            .await?,
    ))
}

pub async fn create_campaign(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>)> {
    let campaign = repo
        .create_campaign(
            auth.org_id,
            NewCampaign {
                name: request.name,
                channel: request.channel,
                budget_cents: request.budget_cents,
                starts_on: request.starts_on,
                ends_on: request.ends_on,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, campaign_id = %campaign.id, "Campaign created");
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn get_campaign(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>> {
    Ok(Json(repo.find_campaign(auth.org_id, id).await?))
}

pub async fn update_campaign(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateCampaignRequest>,
) -> Result<Json<Campaign>> {
    let campaign = repo
        .update_campaign(
            auth.org_id,
            id,
            CampaignChanges {
                name: request.name,
                channel: request.channel,
                budget_cents: request.budget_cents,
                spent_cents: request.spent_cents,
                leads_generated: request.leads_generated,
                starts_on: request.starts_on,
                ends_on: request.ends_on,
                status: request.status,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        campaign_id = %id,
        status = ?campaign.status,
        "Campaign updated"
    );
    Ok(Json(campaign))
}

/// Budget, spend, utilization and cost per lead
pub async fn campaigns_summary(
    State(repo): State<Repository>,
    auth: AuthContext,
) -> Result<Json<CampaignSummary>> {
    let campaigns = repo.all_campaigns(auth.org_id).await?;
    Ok(Json(campaign_summary(&campaigns)))
}
