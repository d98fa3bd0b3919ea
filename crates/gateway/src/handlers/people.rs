//! People and current-caller handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Pagination;
use crate::extract::{QueryParams, ValidJson};
use campusdesk_common::{
    auth::AuthContext,
    db::{
        models::{Organization, Person, PersonRole},
        NewPerson, Page, PersonChanges, Repository,
    },
    errors::{AppError, Result},
};

#[derive(Serialize)]
pub struct MeResponse {
    pub person: Person,
    pub organization: Organization,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePersonRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: PersonRole,
}

fn default_role() -> PersonRole {
    PersonRole::Member
}

#[derive(Serialize)]
pub struct CreatePersonResponse {
    pub person: Person,
    /// Shown once; only its hash is stored
    pub api_key: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePersonRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub role: Option<PersonRole>,
    pub is_active: Option<bool>,
}

/// The calling person and their organization
pub async fn me(State(repo): State<Repository>, auth: AuthContext) -> Result<Json<MeResponse>> {
    let person = repo.find_person(auth.org_id, auth.person_id).await?;
    let organization = repo.find_organization(auth.org_id).await?;
    Ok(Json(MeResponse {
        person,
        organization,
    }))
}

pub async fn list_people(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
) -> Result<Json<Page<Person>>> {
    Ok(Json(repo.list_people(auth.org_id, pagination.page()).await?))
}

/// Invite a person; managers only, and only an owner may add an owner
pub async fn create_person(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreatePersonRequest>,
) -> Result<(StatusCode, Json<CreatePersonResponse>)> {
    auth.require_manager()?;
    if request.role == PersonRole::Owner && auth.role != PersonRole::Owner {
        return Err(AppError::Forbidden {
            message: "Only an owner can add another owner".to_string(),
        });
    }

    let (person, api_key) = repo
        .create_person(
            auth.org_id,
            NewPerson {
                name: request.name,
                email: request.email,
                role: request.role,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        person_id = %person.id,
        role = ?person.role,
        "Person invited"
    );

    Ok((StatusCode::CREATED, Json(CreatePersonResponse { person, api_key })))
}

pub async fn update_person(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdatePersonRequest>,
) -> Result<Json<Person>> {
    auth.require_manager()?;

    let person = repo
        .update_person(
            auth.org_id,
            auth.role,
            id,
            PersonChanges {
                name: request.name,
                role: request.role,
                is_active: request.is_active,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, person_id = %id, "Person updated");
    Ok(Json(person))
}
