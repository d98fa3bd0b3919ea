use super::{ensure_applied, now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::{record_status_change, resolve_status};
use crate::errors::{AppError, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub assignee_person_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TicketChanges {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub assignee_person_id: Option<Option<Uuid>>,
    pub status: Option<TicketStatus>,
}

impl Repository {
    // ========================================================================
    // Ticket Operations
    // ========================================================================

    /// Open a ticket on behalf of `requester`
    pub async fn create_ticket(
        &self,
        org_id: Uuid,
        requester: Uuid,
        ticket: NewTicket,
    ) -> Result<Ticket> {
        if let Some(assignee) = ticket.assignee_person_id {
            self.ensure_person_in_org(org_id, assignee, "assignee_person_id").await?;
        }

        let now = now();
        TicketActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            subject: Set(ticket.subject),
            description: Set(ticket.description),
            priority: Set(ticket.priority),
            status: Set(TicketStatus::Open),
            requester_person_id: Set(requester),
            assignee_person_id: Set(ticket.assignee_person_id),
            resolved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    pub async fn find_ticket(&self, org_id: Uuid, id: Uuid) -> Result<Ticket> {
        TicketEntity::find_by_id(id)
            .filter(TicketColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("ticket", id))
    }

    pub async fn list_tickets(
        &self,
        org_id: Uuid,
        status: Option<TicketStatus>,
        priority: Option<TicketPriority>,
        assignee: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Ticket>> {
        let mut select = TicketEntity::find().filter(TicketColumn::OrgId.eq(org_id));
        if let Some(status) = status {
            select = select.filter(TicketColumn::Status.eq(status));
        }
        if let Some(priority) = priority {
            select = select.filter(TicketColumn::Priority.eq(priority));
        }
        if let Some(assignee) = assignee {
            select = select.filter(TicketColumn::AssigneePersonId.eq(assignee));
        }
        paginate(
            self.read_conn(),
            select.order_by_desc(TicketColumn::CreatedAt),
            page,
        )
        .await
    }

    /// Every ticket of the organization, for summaries
    pub async fn all_tickets(&self, org_id: Uuid) -> Result<Vec<Ticket>> {
        TicketEntity::find()
            .filter(TicketColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply changes. Resolving stamps `resolved_at`; reopening clears it.
    pub async fn update_ticket(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: TicketChanges,
    ) -> Result<Ticket> {
        let ticket = TicketEntity::find_by_id(id)
            .filter(TicketColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("ticket", id))?;

        if let Some(Some(assignee)) = changes.assignee_person_id {
            self.ensure_person_in_org(org_id, assignee, "assignee_person_id").await?;
        }

        let next_status = resolve_status(ticket.status, changes.status)?;

        let now = now();
        let mut update = TicketActiveModel {
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(subject) = changes.subject {
            update.subject = Set(subject);
        }
        if let Some(description) = changes.description {
            update.description = Set(description);
        }
        if let Some(priority) = changes.priority {
            update.priority = Set(priority);
        }
        if let Some(assignee) = changes.assignee_person_id {
            update.assignee_person_id = Set(assignee);
        }
        if let Some(status) = next_status {
            update.status = Set(status);
            match status {
                TicketStatus::Resolved => update.resolved_at = Set(Some(now)),
                TicketStatus::Open | TicketStatus::InProgress => update.resolved_at = Set(None),
                TicketStatus::Closed => {}
            }
        }

        let result = TicketEntity::update_many()
            .set(update)
            .filter(TicketColumn::Id.eq(id))
            .filter(TicketColumn::OrgId.eq(org_id))
            .filter(TicketColumn::Status.eq(ticket.status))
            .exec(self.write_conn())
            .await?;
        ensure_applied(result.rows_affected, "ticket")?;
        record_status_change(next_status);

        if let Some(status) = next_status {
            info!(org_id = %org_id, ticket_id = %id, status = ?status, "Ticket status changed");
        }

        TicketEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("ticket", id))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn projector_broken() -> NewTicket {
        NewTicket {
            subject: "Projector in A1".into(),
            description: "No signal from HDMI".into(),
            priority: TicketPriority::High,
            assignee_person_id: None,
        }
    }

    fn move_to(status: TicketStatus) -> TicketChanges {
        TicketChanges {
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_and_reopen() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let ticket = repo.create_ticket(t.org.id, t.owner.id, projector_broken()).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.requester_person_id, t.owner.id);

        let resolved = repo
            .update_ticket(t.org.id, ticket.id, move_to(TicketStatus::Resolved))
            .await
            .unwrap();
        assert!(resolved.resolved_at.is_some());

        let reopened = repo
            .update_ticket(t.org.id, ticket.id, move_to(TicketStatus::Open))
            .await
            .unwrap();
        assert!(reopened.resolved_at.is_none());

        repo.update_ticket(t.org.id, ticket.id, move_to(TicketStatus::Closed))
            .await
            .unwrap();
        assert!(matches!(
            repo.update_ticket(t.org.id, ticket.id, move_to(TicketStatus::Open)).await,
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_assignee_must_be_member() {
        let repo = repo().await;
        let north = tenant(&repo, "north").await;
        let south = tenant(&repo, "south").await;
        let ticket = repo
            .create_ticket(north.org.id, north.owner.id, projector_broken())
            .await
            .unwrap();

        assert!(matches!(
            repo.update_ticket(
                north.org.id,
                ticket.id,
                TicketChanges {
                    assignee_person_id: Some(Some(south.owner.id)),
                    ..Default::default()
                }
            )
            .await,
            Err(AppError::Validation { .. })
        ));

        let assigned = repo
            .update_ticket(
                north.org.id,
                ticket.id,
                TicketChanges {
                    assignee_person_id: Some(Some(north.owner.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(assigned.assignee_person_id, Some(north.owner.id));

        let mine = repo
            .list_tickets(north.org.id, None, None, Some(north.owner.id), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 1);
    }
}
