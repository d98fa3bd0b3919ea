//! Journal entry entity (double-entry header)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "posted")]
    Posted,
    #[sea_orm(string_value = "reversed")]
    Reversed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub org_id: Uuid,

    #[sea_orm(column_type = "Text", nullable)]
    pub reference: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub entry_date: Date,

    /// `YYYY-MM`
    #[sea_orm(column_type = "Text")]
    pub fiscal_period: String,

    pub status: JournalStatus,

    pub posted_by: Option<Uuid>,

    pub posted_at: Option<DateTimeWithTimeZone>,

    /// Set on a reversal: the entry it cancels
    pub reverses_entry_id: Option<Uuid>,

    /// Set on a reversed entry: the entry that cancelled it
    pub reversed_by_entry_id: Option<Uuid>,

    pub created_by: Uuid,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether this entry was generated by reversing another entry
    pub fn is_reversal(&self) -> bool {
        self.reverses_entry_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrgId",
        to = "super::organization::Column::Id"
    )]
    Organization,

    #[sea_orm(has_many = "super::journal_entry_line::Entity")]
    Lines,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::journal_entry_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
