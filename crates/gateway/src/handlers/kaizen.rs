//! Kaizen suggestion and voting handlers

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
        models::KaizenStatus, NewSuggestion, Page, Repository, SuggestionChanges,
        SuggestionReview, SuggestionWithVotes,
    },
    domain::VoteValue,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSuggestionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub description: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 1000))]
    pub expected_impact: Option<String>,
}

/// Authors edit details while submitted; managers move `status`
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSuggestionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expected_impact: Option<Option<String>>,
    pub status: Option<KaizenStatus>,
    #[validate(length(max = 5000))]
    pub review_notes: Option<String>,
}

impl UpdateSuggestionRequest {
    fn details(&self) -> Option<SuggestionChanges> {
        let changes = SuggestionChanges {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            expected_impact: self.expected_impact.clone(),
        };
        let touched = changes.title.is_some()
            || changes.description.is_some()
            || changes.category.is_some()
            || changes.expected_impact.is_some();
        touched.then_some(changes)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoteRequest {
    /// +1 or -1
    pub value: i16,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionFilter {
    pub status: Option<KaizenStatus>,
    /// `score` orders by net votes; default is newest first
    pub sort: Option<String>,
}

pub async fn list_suggestions(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<SuggestionFilter>,
) -> Result<Json<Page<SuggestionWithVotes>>> {
    let by_score = match filter.sort.as_deref() {
        None | Some("newest") => false,
        Some("score") => true,
        Some(other) => {
            return Err(AppError::invalid_field(
                "sort",
                format!("unknown sort '{}', expected 'score' or 'newest'", other),
            ))
        }
    };

    Ok(Json(
        repo.list_suggestions(
            auth.org_id,
            filter.status,
            by_score,
            auth.person_id,
            pagination.page(),
        )
        .await?,
    ))
}

/// Submit a suggestion; the author's upvote is cast with it
pub async fn create_suggestion(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateSuggestionRequest>,
) -> Result<(StatusCode, Json<SuggestionWithVotes>)> {
    let suggestion = repo
        .create_suggestion(
            auth.org_id,
            auth.person_id,
            NewSuggestion {
                title: request.title,
                description: request.description,
                category: request.category,
                expected_impact: request.expected_impact,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        suggestion_id = %suggestion.suggestion.id,
        "Suggestion submitted"
    );
    Ok((StatusCode::CREATED, Json(suggestion)))
}

pub async fn get_suggestion(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SuggestionWithVotes>> {
    Ok(Json(
        repo.find_suggestion(auth.org_id, id, auth.person_id).await?,
    ))
}

pub async fn update_suggestion(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateSuggestionRequest>,
) -> Result<Json<SuggestionWithVotes>> {
    if request.status.is_none() && request.review_notes.is_some() {
        return Err(AppError::MissingField {
            field: "status".to_string(),
        });
    }
    if request.status.is_some() {
        auth.require_manager()?;
    }

    let details = request.details();
    let review = request.status.map(|status| SuggestionReview {
        status,
        review_notes: request.review_notes,
    });
    if details.is_none() && review.is_none() {
        return Ok(Json(
            repo.find_suggestion(auth.org_id, id, auth.person_id).await?,
        ));
    }

    // edits and the review move land together or not at all
    let edited = details.is_some();
    let suggestion = repo
        .update_suggestion(auth.org_id, id, auth.person_id, details, review)
        .await?;
    if edited {
        tracing::info!(org_id = %auth.org_id, suggestion_id = %id, "Suggestion edited");
    }
    Ok(Json(suggestion))
}

/// Cast or change the caller's vote
pub async fn cast_vote(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<VoteRequest>,
) -> Result<Json<SuggestionWithVotes>> {
    let value = VoteValue::try_from(request.value)?;
    let suggestion = repo
        .cast_vote(auth.org_id, id, auth.person_id, value)
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        suggestion_id = %id,
        direction = value.direction(),
        "Vote cast"
    );
    Ok(Json(suggestion))
}

/// Withdraw the caller's vote, if any
pub async fn withdraw_vote(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SuggestionWithVotes>> {
    let suggestion = repo.withdraw_vote(auth.org_id, id, auth.person_id).await?;
    tracing::info!(org_id = %auth.org_id, suggestion_id = %id, "Vote withdrawn");
    Ok(Json(suggestion))
}
