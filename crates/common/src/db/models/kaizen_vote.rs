//! Kaizen vote entity: one row per (suggestion, person)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kaizen_votes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub suggestion_id: Uuid,

    #[sea_orm(primary_key, auto_increment = false)]
    pub person_id: Uuid,

    pub org_id: Uuid,

    /// +1 or -1
    pub value: i16,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::kaizen_suggestion::Entity",
        from = "Column::SuggestionId",
        to = "super::kaizen_suggestion::Column::Id",
        on_delete = "Cascade"
    )]
    Suggestion,
}

impl Related<super::kaizen_suggestion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suggestion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
