//! Invoice entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status shared by invoices and receivables/payables
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "overdue")]
    Overdue,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl FinancialStatus {
    /// Still owed: issued but neither paid nor cancelled
    pub fn is_outstanding(&self) -> bool {
        matches!(self, FinancialStatus::Pending | FinancialStatus::Overdue)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub org_id: Uuid,

    /// Unique within the organization
    #[sea_orm(column_type = "Text")]
    pub number: String,

    #[sea_orm(column_type = "Text")]
    pub customer_name: String,

    pub issue_date: Date,

    pub due_date: Date,

    pub gross_cents: i64,

    pub discount_cents: i64,

    /// Always `gross_cents - discount_cents`
    pub net_cents: i64,

    pub status: FinancialStatus,

    pub paid_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrgId",
        to = "super::organization::Column::Id"
    )]
    Organization,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
