use super::{ensure_applied, now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::{record_status_change, resolve_status};
use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub channel: String,
    pub budget_cents: i64,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignChanges {
    pub name: Option<String>,
    pub channel: Option<String>,
    pub budget_cents: Option<i64>,
    pub spent_cents: Option<i64>,
    pub leads_generated: Option<i32>,
    pub starts_on: Option<Option<NaiveDate>>,
    pub ends_on: Option<Option<NaiveDate>>,
    pub status: Option<CampaignStatus>,
}

fn validate_schedule(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> Result<()> {
    match (starts_on, ends_on) {
        (Some(start), Some(end)) if end < start => Err(AppError::invalid_field(
            "ends_on",
            "a campaign cannot end before it starts",
        )),
        _ => Ok(()),
    }
}

fn non_negative(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(AppError::invalid_field(field, "must not be negative"));
    }
    Ok(())
}

impl Repository {
    // ========================================================================
    // Campaign Operations
    // ========================================================================

    pub async fn create_campaign(&self, org_id: Uuid, campaign: NewCampaign) -> Result<Campaign> {
        non_negative("budget_cents", campaign.budget_cents)?;
        validate_schedule(campaign.starts_on, campaign.ends_on)?;

        let now = now();
        CampaignActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            name: Set(campaign.name),
            channel: Set(campaign.channel),
            budget_cents: Set(campaign.budget_cents),
            spent_cents: Set(0),
            leads_generated: Set(0),
            starts_on: Set(campaign.starts_on),
            ends_on: Set(campaign.ends_on),
            status: Set(CampaignStatus::Draft),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    pub async fn find_campaign(&self, org_id: Uuid, id: Uuid) -> Result<Campaign> {
        CampaignEntity::find_by_id(id)
            .filter(CampaignColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("campaign", id))
    }

    pub async fn list_campaigns(
        &self,
        org_id: Uuid,
        status: Option<CampaignStatus>,
        page: PageRequest,
    ) -> Result<Page<Campaign>> {
        let mut select = CampaignEntity::find().filter(CampaignColumn::OrgId.eq(org_id));
        if let Some(status) = status {
            select = select.filter(CampaignColumn::Status.eq(status));
        }
        paginate(
            self.read_conn(),
            select.order_by_desc(CampaignColumn::CreatedAt),
            page,
        )
        .await
    }

    /// Every campaign of the organization, for summaries
    pub async fn all_campaigns(&self, org_id: Uuid) -> Result<Vec<Campaign>> {
        CampaignEntity::find()
            .filter(CampaignColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_campaign(
        &self,
        org_id: Uuid,
        id: Uuid,
        changes: CampaignChanges,
    ) -> Result<Campaign> {
        let campaign = CampaignEntity::find_by_id(id)
            .filter(CampaignColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("campaign", id))?;

        if let Some(budget) = changes.budget_cents {
            non_negative("budget_cents", budget)?;
        }
        if let Some(spent) = changes.spent_cents {
            non_negative("spent_cents", spent)?;
        }
        if changes.leads_generated.is_some_and(|l| l < 0) {
            return Err(AppError::invalid_field("leads_generated", "must not be negative"));
        }
        validate_schedule(
            changes.starts_on.unwrap_or(campaign.starts_on),
            changes.ends_on.unwrap_or(campaign.ends_on),
        )?;

        let next_status = resolve_status(campaign.status, changes.status)?;

        let mut update = CampaignActiveModel {
            updated_at: Set(now()),
            ..Default::default()
        };
        if let Some(name) = changes.name {
            update.name = Set(name);
        }
        if let Some(channel) = changes.channel {
            update.channel = Set(channel);
        }
        if let Some(budget) = changes.budget_cents {
            update.budget_cents = Set(budget);
        }
        if let Some(spent) = changes.spent_cents {
            update.spent_cents = Set(spent);
        }
        if let Some(leads) = changes.leads_generated {
            update.leads_generated = Set(leads);
        }
        if let Some(starts_on) = changes.starts_on {
            update.starts_on = Set(starts_on);
        }
        if let Some(ends_on) = changes.ends_on {
            update.ends_on = Set(ends_on);
        }
        if let Some(status) = next_status {
            update.status = Set(status);
        }

        let result = CampaignEntity::update_many()
            .set(update)
            .filter(CampaignColumn::Id.eq(id))
            .filter(CampaignColumn::OrgId.eq(org_id))
            .filter(CampaignColumn::Status.eq(campaign.status))
            .exec(self.write_conn())
            .await?;
        ensure_applied(result.rows_affected, "campaign")?;
        record_status_change(next_status);

        CampaignEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("campaign", id))
    }
}
