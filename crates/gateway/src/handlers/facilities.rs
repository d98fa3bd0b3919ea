//! Room handlers

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
    db::{models::Room, NewRoom, Page, Repository, RoomChanges},
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub building: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: i32,
    pub room_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub building: Option<Option<String>>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub room_type: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomFilter {
    pub is_active: Option<bool>,
}

pub async fn list_rooms(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<RoomFilter>,
) -> Result<Json<Page<Room>>> {
    Ok(Json(
        repo.list_rooms(auth.org_id, filter.is_active, pagination.page())
            .await?,
    ))
}

pub async fn create_room(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>)> {
    let room = repo
        .create_room(
            auth.org_id,
            NewRoom {
                name: request.name,
                building: request.building,
                capacity: request.capacity,
                room_type: request.room_type,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, room_id = %room.id, "Room created");
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_room(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Room>> {
    Ok(Json(repo.find_room(auth.org_id, id).await?))
}

pub async fn update_room(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateRoomRequest>,
) -> Result<Json<Room>> {
    let room = repo
        .update_room(
            auth.org_id,
            id,
            RoomChanges {
                name: request.name,
                building: request.building,
                capacity: request.capacity,
                room_type: request.room_type,
                is_active: request.is_active,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, room_id = %id, "Room updated");
    Ok(Json(room))
}

pub async fn delete_room(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    repo.delete_room(auth.org_id, id).await?;
    tracing::info!(org_id = %auth.org_id, room_id = %id, "Room deleted");
    Ok(StatusCode::NO_CONTENT)
}
