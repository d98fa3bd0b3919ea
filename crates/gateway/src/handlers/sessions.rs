//! Session handlers: exchange an API key for a bearer token

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::extract::ValidJson;
use campusdesk_common::{
    auth::{hash_api_key, JwtManager, API_KEY_PREFIX},
    db::{
        models::{Organization, Person},
        Repository,
    },
    errors::{AppError, Result},
};

/// Create session request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1))]
    pub api_key: String,
}

/// Create session response
#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: String,
    pub person: Person,
    pub organization: Organization,
}

/// Create a new session
pub async fn create_session(
    State(repo): State<Repository>,
    State(jwt): State<Arc<JwtManager>>,
    ValidJson(request): ValidJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    if !request.api_key.starts_with(API_KEY_PREFIX) {
        return Err(AppError::InvalidApiKey);
    }

    let (person, organization) = repo
        .find_person_by_api_key_hash(&hash_api_key(&request.api_key))
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    let session = jwt.generate_token(person.id, organization.id, person.role)?;

    tracing::info!(
        person_id = %person.id,
        org_id = %organization.id,
        "Session created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            token: session.token,
            token_type: "Bearer",
            expires_at: session.expires_at.to_rfc3339(),
            person,
            organization,
        }),
    ))
}
