use super::{now, paginate, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::errors::{AppError, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub building: Option<String>,
    pub capacity: i32,
    pub room_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoomChanges {
    pub name: Option<String>,
    pub building: Option<Option<String>>,
    pub capacity: Option<i32>,
    pub room_type: Option<Option<String>>,
    pub is_active: Option<bool>,
}

fn validate_capacity(capacity: i32) -> Result<()> {
    if capacity < 1 {
        return Err(AppError::invalid_field("capacity", "capacity must be at least 1"));
    }
    Ok(())
}

impl Repository {
    // ========================================================================
    // Room Operations
    // ========================================================================

    async fn ensure_room_name_free(
        &self,
        org_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<()> {
        let mut select = RoomEntity::find()
            .filter(RoomColumn::OrgId.eq(org_id))
            .filter(RoomColumn::Name.eq(name));
        if let Some(id) = except {
            select = select.filter(RoomColumn::Id.ne(id));
        }
        if select.one(self.write_conn()).await?.is_some() {
            return Err(AppError::Duplicate {
                message: format!("A room named '{}' already exists", name),
            });
        }
        Ok(())
    }

    /// Create a room; names are unique per organization
    pub async fn create_room(&self, org_id: Uuid, room: NewRoom) -> Result<Room> {
        validate_capacity(room.capacity)?;
        self.ensure_room_name_free(org_id, &room.name, None).await?;

        let now = now();
        RoomActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            name: Set(room.name),
            building: Set(room.building),
            capacity: Set(room.capacity),
            room_type: Set(room.room_type),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find a room by ID
    pub async fn find_room(&self, org_id: Uuid, id: Uuid) -> Result<Room> {
        RoomEntity::find_by_id(id)
            .filter(RoomColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("room", id))
    }

    /// List rooms by name
    pub async fn list_rooms(
        &self,
        org_id: Uuid,
        is_active: Option<bool>,
        page: PageRequest,
    ) -> Result<Page<Room>> {
        let mut select = RoomEntity::find().filter(RoomColumn::OrgId.eq(org_id));
        if let Some(is_active) = is_active {
            select = select.filter(RoomColumn::IsActive.eq(is_active));
        }
        paginate(self.read_conn(), select.order_by_asc(RoomColumn::Name), page).await
    }

    pub async fn update_room(&self, org_id: Uuid, id: Uuid, changes: RoomChanges) -> Result<Room> {
        let room = RoomEntity::find_by_id(id)
            .filter(RoomColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("room", id))?;

        if let Some(capacity) = changes.capacity {
            validate_capacity(capacity)?;
        }
        if let Some(ref name) = changes.name {
            if name != &room.name {
                self.ensure_room_name_free(org_id, name, Some(id)).await?;
            }
        }

        let mut active: RoomActiveModel = room.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(building) = changes.building {
            active.building = Set(building);
        }
        if let Some(capacity) = changes.capacity {
            active.capacity = Set(capacity);
        }
        if let Some(room_type) = changes.room_type {
            active.room_type = Set(room_type);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(now());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete a room. Meetings booked in it keep their slot without a room.
    pub async fn delete_room(&self, org_id: Uuid, id: Uuid) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        MeetingEntity::update_many()
            .col_expr(MeetingColumn::RoomId, Expr::value(Option::<Uuid>::None))
            .filter(MeetingColumn::OrgId.eq(org_id))
            .filter(MeetingColumn::RoomId.eq(id))
            .exec(&txn)
            .await?;

        let result = RoomEntity::delete_many()
            .filter(RoomColumn::Id.eq(id))
            .filter(RoomColumn::OrgId.eq(org_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            // dropping the transaction rolls back
            return Err(AppError::not_found("room", id));
        }

        txn.commit().await?;
        info!(org_id = %org_id, room_id = %id, "Room deleted");
        Ok(())
    }
}
