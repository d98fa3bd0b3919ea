use super::{now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::Lifecycle;
use crate::errors::{AppError, Result};
use crate::metrics;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub title: String,
    pub description: Option<String>,
    pub room_id: Option<Uuid>,
    pub starts_at: DateTimeWithTimeZone,
    pub ends_at: DateTimeWithTimeZone,
}

#[derive(Debug, Clone, Default)]
pub struct MeetingChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub room_id: Option<Option<Uuid>>,
    pub starts_at: Option<DateTimeWithTimeZone>,
    pub ends_at: Option<DateTimeWithTimeZone>,
}

/// Either an internal person or an external guest
#[derive(Debug, Clone, Default)]
pub struct NewParticipant {
    pub person_id: Option<Uuid>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranscriptChunkInput {
    pub content: String,
    pub speaker: Option<String>,
    /// When given, must equal the next free index
    pub chunk_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingDetail {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub participants: Vec<MeetingParticipant>,
}

fn validate_window(starts_at: &DateTimeWithTimeZone, ends_at: &DateTimeWithTimeZone) -> Result<()> {
    if ends_at <= starts_at {
        return Err(AppError::invalid_field("ends_at", "a meeting must end after it starts"));
    }
    Ok(())
}

async fn find_meeting_in<C: ConnectionTrait>(conn: &C, org_id: Uuid, id: Uuid) -> Result<Meeting> {
    MeetingEntity::find_by_id(id)
        .filter(MeetingColumn::OrgId.eq(org_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("meeting", id))
}

impl Repository {
    // ========================================================================
    // Meeting Operations
    // ========================================================================

    async fn ensure_bookable_room(&self, org_id: Uuid, room_id: Uuid) -> Result<()> {
        let room = RoomEntity::find_by_id(room_id)
            .filter(RoomColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?;
        match room {
            Some(room) if room.is_active => Ok(()),
            Some(_) => Err(AppError::invalid_field("room_id", "room is not active")),
            None => Err(AppError::invalid_field(
                "room_id",
                format!("room {} does not exist", room_id),
            )),
        }
    }

    /// Request a meeting; it starts out pending approval
    pub async fn create_meeting(
        &self,
        org_id: Uuid,
        organizer: Uuid,
        meeting: NewMeeting,
    ) -> Result<Meeting> {
        validate_window(&meeting.starts_at, &meeting.ends_at)?;
        if let Some(room_id) = meeting.room_id {
            self.ensure_bookable_room(org_id, room_id).await?;
        }

        let now = now();
        MeetingActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            title: Set(meeting.title),
            description: Set(meeting.description),
            room_id: Set(meeting.room_id),
            starts_at: Set(meeting.starts_at),
            ends_at: Set(meeting.ends_at),
            organizer_person_id: Set(organizer),
            approval: Set(MeetingApproval::Pending),
            decided_by: Set(None),
            decided_at: Set(None),
            decision_note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find a meeting with its participants
    pub async fn find_meeting(&self, org_id: Uuid, id: Uuid) -> Result<MeetingDetail> {
        let meeting = find_meeting_in(self.read_conn(), org_id, id).await?;
        let participants = MeetingParticipantEntity::find()
            .filter(MeetingParticipantColumn::MeetingId.eq(id))
            .order_by_asc(MeetingParticipantColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        Ok(MeetingDetail {
            meeting,
            participants,
        })
    }

    /// List meetings, latest start first
    pub async fn list_meetings(
        &self,
        org_id: Uuid,
        approval: Option<MeetingApproval>,
        page: PageRequest,
    ) -> Result<Page<Meeting>> {
        let mut select = MeetingEntity::find().filter(MeetingColumn::OrgId.eq(org_id));
        if let Some(approval) = approval {
            select = select.filter(MeetingColumn::Approval.eq(approval));
        }
        paginate(
            self.read_conn(),
            select.order_by_desc(MeetingColumn::StartsAt),
            page,
        )
        .await
    }

    pub async fn count_meetings(&self, org_id: Uuid, approval: MeetingApproval) -> Result<u64> {
        MeetingEntity::find()
            .filter(MeetingColumn::OrgId.eq(org_id))
            .filter(MeetingColumn::Approval.eq(approval))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Edit details while the meeting is still pending
    pub async fn update_meeting(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: MeetingChanges,
    ) -> Result<MeetingDetail> {
        let meeting = find_meeting_in(self.write_conn(), org_id, id).await?;
        if meeting.approval != MeetingApproval::Pending {
            return Err(AppError::Validation {
                message: format!(
                    "Meeting is {}; only pending meetings can be edited",
                    meeting.approval.label()
                ),
                field: Some("approval".to_string()),
            });
        }

        let starts_at = changes.starts_at.unwrap_or(meeting.starts_at);
        let ends_at = changes.ends_at.unwrap_or(meeting.ends_at);
        validate_window(&starts_at, &ends_at)?;
        if let Some(Some(room_id)) = changes.room_id {
            self.ensure_bookable_room(org_id, room_id).await?;
        }

        let mut active: MeetingActiveModel = meeting.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(room_id) = changes.room_id {
            active.room_id = Set(room_id);
        }
        active.starts_at = Set(starts_at);
        active.ends_at = Set(ends_at);
        active.updated_at = Set(now());
        active.update(self.write_conn()).await?;

        self.find_meeting(org_id, id).await
    }

    /// Approve or reject a pending meeting. Rejections must carry a note.
    pub async fn decide_meeting(
        &self,
        org_id: Uuid,
        id: Uuid,
        actor: Uuid,
        approval: MeetingApproval,
        note: Option<String>,
    ) -> Result<Meeting> {
        if approval == MeetingApproval::Pending {
            return Err(AppError::invalid_field(
                "approval",
                "a decision must be approved or rejected",
            ));
        }
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if approval == MeetingApproval::Rejected && note.is_none() {
            return Err(AppError::MissingField {
                field: "note".to_string(),
            });
        }

        let meeting = find_meeting_in(self.write_conn(), org_id, id).await?;
        if meeting.approval != MeetingApproval::Pending {
            metrics::record_transition_rejected(MeetingApproval::ENTITY);
            return Err(AppError::InvalidTransition {
                entity: MeetingApproval::ENTITY,
                from: meeting.approval.label(),
                to: approval.label(),
            });
        }

        let now = now();
        let result = MeetingEntity::update_many()
            .set(MeetingActiveModel {
                approval: Set(approval),
                decided_by: Set(Some(actor)),
                decided_at: Set(Some(now)),
                decision_note: Set(note),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(MeetingColumn::Id.eq(id))
            .filter(MeetingColumn::OrgId.eq(org_id))
            .filter(MeetingColumn::Approval.eq(MeetingApproval::Pending))
            .exec(self.write_conn())
            .await?;
        super::ensure_applied(result.rows_affected, "meeting")?;

        metrics::record_transition(MeetingApproval::ENTITY, approval.label());
        info!(org_id = %org_id, meeting_id = %id, approval = %approval.label(), "Meeting decided");

        find_meeting_in(self.write_conn(), org_id, id).await
    }

    // ========================================================================
    // Participant Operations
    // ========================================================================

    /// Add a participant. An internal person can be listed once per meeting.
    pub async fn add_participant(
        &self,
        org_id: Uuid,
        meeting_id: Uuid,
        participant: NewParticipant,
    ) -> Result<MeetingParticipant> {
        find_meeting_in(self.write_conn(), org_id, meeting_id).await?;

        let (display_name, email) = match participant.person_id {
            Some(person_id) => {
                let person = PersonEntity::find_by_id(person_id)
                    .filter(PersonColumn::OrgId.eq(org_id))
                    .one(self.read_conn())
                    .await?
                    .ok_or_else(|| {
                        AppError::invalid_field(
                            "person_id",
                            format!("person {} is not a member of this organization", person_id),
                        )
                    })?;

                let already = MeetingParticipantEntity::find()
                    .filter(MeetingParticipantColumn::MeetingId.eq(meeting_id))
                    .filter(MeetingParticipantColumn::PersonId.eq(person_id))
                    .one(self.write_conn())
                    .await?;
                if already.is_some() {
                    return Err(AppError::Duplicate {
                        message: format!("{} is already a participant", person.name),
                    });
                }

                (
                    participant.display_name.unwrap_or(person.name),
                    participant.email.or(Some(person.email)),
                )
            }
            None => {
                let name = participant
                    .display_name
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| AppError::MissingField {
                        field: "display_name".to_string(),
                    })?;
                (name, participant.email)
            }
        };

        MeetingParticipantActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            meeting_id: Set(meeting_id),
            person_id: Set(participant.person_id),
            display_name: Set(display_name),
            email: Set(email),
            created_at: Set(now()),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    pub async fn remove_participant(
        &self,
        org_id: Uuid,
        meeting_id: Uuid,
        participant_id: Uuid,
    ) -> Result<()> {
        find_meeting_in(self.write_conn(), org_id, meeting_id).await?;
        let result = MeetingParticipantEntity::delete_many()
            .filter(MeetingParticipantColumn::Id.eq(participant_id))
            .filter(MeetingParticipantColumn::MeetingId.eq(meeting_id))
            .filter(MeetingParticipantColumn::OrgId.eq(org_id))
            .exec(self.write_conn())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found("participant", participant_id));
        }
        Ok(())
    }

    // ========================================================================
    // Transcript Operations
    // ========================================================================

    /// Append a chunk at the next index. Chunks are never edited or removed.
    pub async fn append_transcript(
        &self,
        org_id: Uuid,
        meeting_id: Uuid,
        chunk: TranscriptChunkInput,
    ) -> Result<MeetingTranscript> {
        let txn = self.write_conn().begin().await?;

        find_meeting_in(&txn, org_id, meeting_id).await?;

        let next_index = MeetingTranscriptEntity::find()
            .filter(MeetingTranscriptColumn::MeetingId.eq(meeting_id))
            .order_by_desc(MeetingTranscriptColumn::ChunkIndex)
            .one(&txn)
            .await?
            .map(|last| last.chunk_index + 1)
            .unwrap_or(0);

        if let Some(requested) = chunk.chunk_index {
            if requested != next_index {
                return Err(AppError::Conflict {
                    message: format!(
                        "Transcript chunk {} was requested but the next chunk is {}",
                        requested, next_index
                    ),
                });
            }
        }

        let created = MeetingTranscriptActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            meeting_id: Set(meeting_id),
            chunk_index: Set(next_index),
            speaker: Set(chunk.speaker),
            content: Set(chunk.content),
            created_at: Set(now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(created)
    }

    /// All chunks in order
    pub async fn transcript(&self, org_id: Uuid, meeting_id: Uuid) -> Result<Vec<MeetingTranscript>> {
        find_meeting_in(self.read_conn(), org_id, meeting_id).await?;
        MeetingTranscriptEntity::find()
            .filter(MeetingTranscriptColumn::MeetingId.eq(meeting_id))
            .order_by_asc(MeetingTranscriptColumn::ChunkIndex)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::NewRoom;
    use super::*;
    use chrono::{Duration, Utc};

    fn standup(room_id: Option<Uuid>) -> NewMeeting {
        let starts_at = (Utc::now() + Duration::days(1)).fixed_offset();
        NewMeeting {
            title: "Staff standup".into(),
            description: None,
            room_id,
            starts_at,
            ends_at: starts_at + Duration::minutes(30),
        }
    }

    #[tokio::test]
    async fn test_meeting_window_and_room() {
        let repo = repo().await;
        let north = tenant(&repo, "north").await;
        let south = tenant(&repo, "south").await;

        let mut backwards = standup(None);
        backwards.ends_at = backwards.starts_at;
        assert!(repo.create_meeting(north.org.id, north.owner.id, backwards).await.is_err());

        let foreign_room = repo
            .create_room(
                south.org.id,
                NewRoom {
                    name: "Hall".into(),
                    building: None,
                    capacity: 100,
                    room_type: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            repo.create_meeting(north.org.id, north.owner.id, standup(Some(foreign_room.id)))
                .await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_decision_rules() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let m = repo.create_meeting(t.org.id, t.owner.id, standup(None)).await.unwrap();

        assert!(matches!(
            repo.decide_meeting(t.org.id, m.id, t.owner.id, MeetingApproval::Rejected, Some("  ".into()))
                .await,
            Err(AppError::MissingField { .. })
        ));

        let approved = repo
            .decide_meeting(t.org.id, m.id, t.owner.id, MeetingApproval::Approved, None)
            .await
            .unwrap();
        assert_eq!(approved.approval, MeetingApproval::Approved);
        assert_eq!(approved.decided_by, Some(t.owner.id));

        assert!(matches!(
            repo.decide_meeting(t.org.id, m.id, t.owner.id, MeetingApproval::Rejected, Some("late".into()))
                .await,
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(
            repo.update_meeting(
                t.org.id,
                m.id,
                MeetingChanges {
                    title: Some("Moved".into()),
                    ..Default::default()
                }
            )
            .await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_participants() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let m = repo.create_meeting(t.org.id, t.owner.id, standup(None)).await.unwrap();

        let internal = repo
            .add_participant(
                t.org.id,
                m.id,
                NewParticipant {
                    person_id: Some(t.owner.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(internal.display_name, t.owner.name);

        assert!(matches!(
            repo.add_participant(
                t.org.id,
                m.id,
                NewParticipant {
                    person_id: Some(t.owner.id),
                    ..Default::default()
                },
            )
            .await,
            Err(AppError::Duplicate { .. })
        ));

        repo.add_participant(
            t.org.id,
            m.id,
            NewParticipant {
                person_id: None,
                display_name: Some("Visiting inspector".into()),
                email: None,
            },
        )
        .await
        .unwrap();

        let detail = repo.find_meeting(t.org.id, m.id).await.unwrap();
        assert_eq!(detail.participants.len(), 2);

        repo.remove_participant(t.org.id, m.id, internal.id).await.unwrap();
        assert!(matches!(
            repo.remove_participant(t.org.id, m.id, internal.id).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_transcript_is_append_only_and_dense() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let m = repo.create_meeting(t.org.id, t.owner.id, standup(None)).await.unwrap();

        let chunk = |content: &str, chunk_index| TranscriptChunkInput {
            content: content.into(),
            speaker: Some("Chair".into()),
            chunk_index,
        };

        let first = repo.append_transcript(t.org.id, m.id, chunk("Welcome", None)).await.unwrap();
        assert_eq!(first.chunk_index, 0);
        let second = repo.append_transcript(t.org.id, m.id, chunk("Agenda", Some(1))).await.unwrap();
        assert_eq!(second.chunk_index, 1);

        assert!(matches!(
            repo.append_transcript(t.org.id, m.id, chunk("Stale", Some(1))).await,
            Err(AppError::Conflict { .. })
        ));

        let chunks = repo.transcript(t.org.id, m.id).await.unwrap();
        let indexes: Vec<i32> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }
}
