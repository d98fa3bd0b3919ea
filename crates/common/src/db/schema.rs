//! Schema bootstrap from the entity definitions
//!
//! Tables are created in foreign-key order. Every statement is
//! `IF NOT EXISTS`, so running it against an existing database is a no-op.

use crate::db::models::*;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::info;

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(E::default()) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

/// Per-organization uniqueness the entity attributes cannot express
fn scoped_unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("ux_accounts_org_code")
            .table(AccountEntity)
            .col(AccountColumn::OrgId)
            .col(AccountColumn::Code)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_invoices_org_number")
            .table(InvoiceEntity)
            .col(InvoiceColumn::OrgId)
            .col(InvoiceColumn::Number)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_rooms_org_name")
            .table(RoomEntity)
            .col(RoomColumn::OrgId)
            .col(RoomColumn::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
        // NULL person ids (external guests) never collide
        Index::create()
            .name("ux_meeting_participants_person")
            .table(MeetingParticipantEntity)
            .col(MeetingParticipantColumn::MeetingId)
            .col(MeetingParticipantColumn::PersonId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_meeting_transcripts_chunk")
            .table(MeetingTranscriptEntity)
            .col(MeetingTranscriptColumn::MeetingId)
            .col(MeetingTranscriptColumn::ChunkIndex)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_journal_entry_lines_index")
            .table(JournalEntryLineEntity)
            .col(JournalEntryLineColumn::EntryId)
            .col(JournalEntryLineColumn::LineIndex)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Create every table and index that does not exist yet
pub async fn ensure_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, OrganizationEntity).await?;
    create_table(db, &schema, PersonEntity).await?;
    create_table(db, &schema, LeadEntity).await?;
    create_table(db, &schema, AccountEntity).await?;
    create_table(db, &schema, JournalEntryEntity).await?;
    create_table(db, &schema, JournalEntryLineEntity).await?;
    create_table(db, &schema, KaizenSuggestionEntity).await?;
    create_table(db, &schema, KaizenVoteEntity).await?;
    create_table(db, &schema, InvoiceEntity).await?;
    create_table(db, &schema, ObligationEntity).await?;
    create_table(db, &schema, RoomEntity).await?;
    create_table(db, &schema, MeetingEntity).await?;
    create_table(db, &schema, MeetingParticipantEntity).await?;
    create_table(db, &schema, MeetingTranscriptEntity).await?;
    create_table(db, &schema, CampaignEntity).await?;
    create_table(db, &schema, TicketEntity).await?;

    for index in scoped_unique_indexes() {
        db.execute(backend.build(&index)).await?;
    }

    info!("Database schema is up to date");
    Ok(())
}
