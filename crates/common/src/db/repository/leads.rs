use super::{ensure_applied, now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::{record_status_change, resolve_status};
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub estimated_value_cents: i64,
    pub notes: Option<String>,
    pub owner_person_id: Option<Uuid>,
}

/// Partial update; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub source: Option<Option<String>>,
    pub estimated_value_cents: Option<i64>,
    pub notes: Option<Option<String>>,
    pub owner_person_id: Option<Option<Uuid>>,
    pub status: Option<LeadStatus>,
}

impl Repository {
    // ========================================================================
    // Lead Operations
    // ========================================================================

    /// Require `person_id` to be a person of `org_id`
    pub(super) async fn ensure_person_in_org(
        &self,
        org_id: Uuid,
        person_id: Uuid,
        field: &str,
    ) -> Result<()> {
        let found = PersonEntity::find_by_id(person_id)
            .filter(PersonColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(AppError::invalid_field(
                field,
                format!("person {} is not a member of this organization", person_id),
            )),
        }
    }

    /// Create a lead in status `new`
    pub async fn create_lead(&self, org_id: Uuid, lead: NewLead) -> Result<Lead> {
        if let Some(owner) = lead.owner_person_id {
            self.ensure_person_in_org(org_id, owner, "owner_person_id").await?;
        }

        let now = now();
        LeadActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            name: Set(lead.name),
            email: Set(lead.email),
            phone: Set(lead.phone),
            company: Set(lead.company),
            source: Set(lead.source),
            estimated_value_cents: Set(lead.estimated_value_cents),
            status: Set(LeadStatus::New),
            notes: Set(lead.notes),
            owner_person_id: Set(lead.owner_person_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find a lead by ID
    pub async fn find_lead(&self, org_id: Uuid, id: Uuid) -> Result<Lead> {
        LeadEntity::find_by_id(id)
            .filter(LeadColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("lead", id))
    }

    /// List leads, newest first
    pub async fn list_leads(
        &self,
        org_id: Uuid,
        status: Option<LeadStatus>,
        page: PageRequest,
    ) -> Result<Page<Lead>> {
        let mut select = LeadEntity::find().filter(LeadColumn::OrgId.eq(org_id));
        if let Some(status) = status {
            select = select.filter(LeadColumn::Status.eq(status));
        }
        paginate(
            self.read_conn(),
            select.order_by_desc(LeadColumn::CreatedAt),
            page,
        )
        .await
    }

    /// Every lead of the organization, for summaries
    pub async fn all_leads(&self, org_id: Uuid) -> Result<Vec<Lead>> {
        LeadEntity::find()
            .filter(LeadColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply changes; a status change must follow the lead pipeline
    pub async fn update_lead(&self, org_id: Uuid, id: Uuid, changes: LeadChanges) -> Result<Lead> {
        let lead = LeadEntity::find_by_id(id)
            .filter(LeadColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("lead", id))?;

        if let Some(Some(owner)) = changes.owner_person_id {
            self.ensure_person_in_org(org_id, owner, "owner_person_id").await?;
        }

        let next_status = resolve_status(lead.status, changes.status)?;

        let mut update = LeadActiveModel {
            updated_at: Set(now()),
            ..Default::default()
        };
        if let Some(name) = changes.name {
            update.name = Set(name);
        }
        if let Some(email) = changes.email {
            update.email = Set(email);
        }
        if let Some(phone) = changes.phone {
            update.phone = Set(phone);
        }
        if let Some(company) = changes.company {
            update.company = Set(company);
        }
        if let Some(source) = changes.source {
            update.source = Set(source);
        }
        if let Some(value) = changes.estimated_value_cents {
            update.estimated_value_cents = Set(value);
        }
        if let Some(notes) = changes.notes {
            update.notes = Set(notes);
        }
        if let Some(owner) = changes.owner_person_id {
            update.owner_person_id = Set(owner);
        }
        if let Some(status) = next_status {
            update.status = Set(status);
        }

        // guarded on the status the transition was checked against
        let result = LeadEntity::update_many()
            .set(update)
            .filter(LeadColumn::Id.eq(id))
            .filter(LeadColumn::OrgId.eq(org_id))
            .filter(LeadColumn::Status.eq(lead.status))
            .exec(self.write_conn())
            .await?;
        ensure_applied(result.rows_affected, "lead")?;
        record_status_change(next_status);

        LeadEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("lead", id))
    }
}
