//! Operator endpoints guarded by the `x-admin-token` header

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::extract::ValidJson;
use campusdesk_common::{
    config::AppConfig,
    db::{
        models::{Organization, Person, PersonRole},
        NewPerson, Repository,
    },
    errors::{AppError, Result},
};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

fn validate_slug(slug: &str) -> std::result::Result<(), ValidationError> {
    let well_formed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct OwnerInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 63), custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(nested)]
    pub owner: OwnerInput,
}

#[derive(Serialize)]
pub struct CreateOrganizationResponse {
    pub organization: Organization,
    pub owner: Person,
    /// Shown once; only its hash is stored
    pub api_key: String,
}

fn require_admin_token(config: &AppConfig, headers: &HeaderMap) -> Result<()> {
    let expected = config
        .auth
        .admin_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Forbidden {
            message: "Provisioning is disabled".to_string(),
        })?;

    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        return Err(AppError::Forbidden {
            message: "Invalid admin token".to_string(),
        });
    }
    Ok(())
}

/// Provision an organization together with its owner
pub async fn create_organization(
    State(config): State<Arc<AppConfig>>,
    State(repo): State<Repository>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<CreateOrganizationResponse>)> {
    require_admin_token(&config, &headers)?;

    let (organization, owner, api_key) = repo
        .create_organization(
            request.name,
            request.slug,
            NewPerson {
                name: request.owner.name,
                email: request.owner.email,
                role: PersonRole::Owner,
            },
        )
        .await?;

    tracing::info!(
        org_id = %organization.id,
        slug = %organization.slug,
        "Organization provisioned"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            organization,
            owner,
            api_key,
        }),
    ))
}
