//! Meeting, participant and transcript handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Pagination;
use crate::extract::{double_option, QueryParams, ValidJson};
use campusdesk_common::{
    auth::AuthContext,
    db::{
        models::{Meeting, MeetingApproval, MeetingParticipant, MeetingTranscript},
        MeetingChanges, MeetingDetail, NewMeeting, NewParticipant, Page, Repository,
        TranscriptChunkInput,
    },
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMeetingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub room_id: Option<Uuid>,
    pub starts_at: DateTimeWithTimeZone,
    pub ends_at: DateTimeWithTimeZone,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeetingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub room_id: Option<Option<Uuid>>,
    pub starts_at: Option<DateTimeWithTimeZone>,
    pub ends_at: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecisionRequest {
    pub approval: MeetingApproval,
    #[validate(length(min = 1, max = 2000))]
    pub note: Option<String>,
}

/// Either `person_id` for a member, or `display_name` for a guest
#[derive(Debug, Deserialize, Validate)]
pub struct AddParticipantRequest {
    pub person_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub display_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AppendTranscriptRequest {
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(length(max = 200))]
    pub speaker: Option<String>,
    #[validate(range(min = 0))]
    pub chunk_index: Option<i32>,
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub meeting_id: Uuid,
    pub chunks: Vec<MeetingTranscript>,
    /// Chunk contents in order, newline separated
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeetingFilter {
    pub approval: Option<MeetingApproval>,
}

pub async fn list_meetings(
    State(repo): State<Repository>,
    auth: AuthContext,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(filter): QueryParams<MeetingFilter>,
) -> Result<Json<Page<Meeting>>> {
    Ok(Json(
        repo.list_meetings(auth.org_id, filter.approval, pagination.page())
            .await?,
    ))
}

/// Request a meeting; it starts out pending approval
pub async fn create_meeting(
    State(repo): State<Repository>,
    auth: AuthContext,
    ValidJson(request): ValidJson<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<Meeting>)> {
    let meeting = repo
        .create_meeting(
            auth.org_id,
            auth.person_id,
            NewMeeting {
                title: request.title,
                description: request.description,
                room_id: request.room_id,
                starts_at: request.starts_at,
                ends_at: request.ends_at,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, meeting_id = %meeting.id, "Meeting requested");
    Ok((StatusCode::CREATED, Json(meeting)))
}

pub async fn get_meeting(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<MeetingDetail>> {
    Ok(Json(repo.find_meeting(auth.org_id, id).await?))
}

pub async fn update_meeting(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateMeetingRequest>,
) -> Result<Json<MeetingDetail>> {
    let meeting = repo
        .update_meeting(
            auth.org_id,
            id,
            MeetingChanges {
                title: request.title,
                description: request.description,
                room_id: request.room_id,
                starts_at: request.starts_at,
                ends_at: request.ends_at,
            },
        )
        .await?;

    tracing::info!(org_id = %auth.org_id, meeting_id = %id, "Meeting updated");
    Ok(Json(meeting))
}

/// Approve or reject a pending meeting; managers only
pub async fn decide_meeting(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<DecisionRequest>,
) -> Result<Json<Meeting>> {
    auth.require_manager()?;
    let meeting = repo
        .decide_meeting(auth.org_id, id, auth.person_id, request.approval, request.note)
        .await?;
    Ok(Json(meeting))
}

pub async fn add_participant(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<AddParticipantRequest>,
) -> Result<(StatusCode, Json<MeetingParticipant>)> {
    let participant = repo
        .add_participant(
            auth.org_id,
            id,
            NewParticipant {
                person_id: request.person_id,
                display_name: request.display_name,
                email: request.email,
            },
        )
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        meeting_id = %id,
        participant_id = %participant.id,
        "Participant added"
    );
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn remove_participant(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path((id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    repo.remove_participant(auth.org_id, id, participant_id)
        .await?;

    tracing::info!(
        org_id = %auth.org_id,
        meeting_id = %id,
        participant_id = %participant_id,
        "Participant removed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Append one chunk; transcripts are never edited
pub async fn append_transcript(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidJson(request): ValidJson<AppendTranscriptRequest>,
) -> Result<(StatusCode, Json<MeetingTranscript>)> {
    let chunk = repo
        .append_transcript(
            auth.org_id,
            id,
            TranscriptChunkInput {
                content: request.content,
                speaker: request.speaker,
                chunk_index: request.chunk_index,
            },
        )
        .await?;

    tracing::debug!(
        org_id = %auth.org_id,
        meeting_id = %id,
        chunk_index = chunk.chunk_index,
        "Transcript chunk appended"
    );
    Ok((StatusCode::CREATED, Json(chunk)))
}

pub async fn get_transcript(
    State(repo): State<Repository>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>> {
    let chunks = repo.transcript(auth.org_id, id).await?;
    let text = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Json(TranscriptResponse {
        meeting_id: id,
        chunks,
        text,
    }))
}
