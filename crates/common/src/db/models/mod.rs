//! SeaORM entity models
//!
//! Every table except `organizations` is scoped by `org_id`.

mod organization;
mod person;
mod lead;
mod account;
mod journal_entry;
mod journal_entry_line;
mod kaizen_suggestion;
mod kaizen_vote;
mod invoice;
mod obligation;
mod meeting;
mod meeting_participant;
mod meeting_transcript;
mod room;
mod campaign;
mod ticket;

pub use organization::{
    Entity as OrganizationEntity,
    Model as Organization,
    ActiveModel as OrganizationActiveModel,
    Column as OrganizationColumn,
};

pub use person::{
    Entity as PersonEntity,
    Model as Person,
    ActiveModel as PersonActiveModel,
    Column as PersonColumn,
    PersonRole,
};

pub use lead::{
    Entity as LeadEntity,
    Model as Lead,
    ActiveModel as LeadActiveModel,
    Column as LeadColumn,
    LeadStatus,
};

pub use account::{
    Entity as AccountEntity,
    Model as Account,
    ActiveModel as AccountActiveModel,
    Column as AccountColumn,
    AccountType,
};

pub use journal_entry::{
    Entity as JournalEntryEntity,
    Model as JournalEntry,
    ActiveModel as JournalEntryActiveModel,
    Column as JournalEntryColumn,
    JournalStatus,
};

pub use journal_entry_line::{
    Entity as JournalEntryLineEntity,
    Model as JournalEntryLine,
    ActiveModel as JournalEntryLineActiveModel,
    Column as JournalEntryLineColumn,
};

pub use kaizen_suggestion::{
    Entity as KaizenSuggestionEntity,
    Model as KaizenSuggestion,
    ActiveModel as KaizenSuggestionActiveModel,
    Column as KaizenSuggestionColumn,
    KaizenStatus,
};

pub use kaizen_vote::{
    Entity as KaizenVoteEntity,
    Model as KaizenVote,
    ActiveModel as KaizenVoteActiveModel,
    Column as KaizenVoteColumn,
};

pub use invoice::{
    Entity as InvoiceEntity,
    Model as Invoice,
    ActiveModel as InvoiceActiveModel,
    Column as InvoiceColumn,
    FinancialStatus,
};

pub use obligation::{
    Entity as ObligationEntity,
    Model as Obligation,
    ActiveModel as ObligationActiveModel,
    Column as ObligationColumn,
    ObligationKind,
};

pub use meeting::{
    Entity as MeetingEntity,
    Model as Meeting,
    ActiveModel as MeetingActiveModel,
    Column as MeetingColumn,
    MeetingApproval,
};

pub use meeting_participant::{
    Entity as MeetingParticipantEntity,
    Model as MeetingParticipant,
    ActiveModel as MeetingParticipantActiveModel,
    Column as MeetingParticipantColumn,
};

pub use meeting_transcript::{
    Entity as MeetingTranscriptEntity,
    Model as MeetingTranscript,
    ActiveModel as MeetingTranscriptActiveModel,
    Column as MeetingTranscriptColumn,
};

pub use room::{
    Entity as RoomEntity,
    Model as Room,
    ActiveModel as RoomActiveModel,
    Column as RoomColumn,
};

pub use campaign::{
    Entity as CampaignEntity,
    Model as Campaign,
    ActiveModel as CampaignActiveModel,
    Column as CampaignColumn,
    CampaignStatus,
};

pub use ticket::{
    Entity as TicketEntity,
    Model as Ticket,
    ActiveModel as TicketActiveModel,
    Column as TicketColumn,
    TicketStatus,
    TicketPriority,
};
