use super::{ensure_applied, now, Page, PageRequest, Repository};
use crate::db::models::*;
use crate::domain::{record_status_change, resolve_status, voting, Lifecycle, VoteTally, VoteValue};
use crate::errors::{AppError, Result};
use crate::metrics;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub expected_impact: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Option<String>>,
    pub expected_impact: Option<Option<String>>,
}

/// A review decision: the target status plus optional notes
#[derive(Debug, Clone)]
pub struct SuggestionReview {
    pub status: KaizenStatus,
    pub review_notes: Option<String>,
}

/// A suggestion with its vote counts, computed from the vote rows
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionWithVotes {
    #[serde(flatten)]
    pub suggestion: KaizenSuggestion,
    pub upvotes: u64,
    pub downvotes: u64,
    /// `upvotes - downvotes`
    pub score: i64,
    /// The viewer's own vote, if any
    pub my_vote: Option<i16>,
}

impl SuggestionWithVotes {
    fn new(suggestion: KaizenSuggestion, tally: VoteTally, my_vote: Option<i16>) -> Self {
        Self {
            suggestion,
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            score: tally.net(),
            my_vote,
        }
    }
}

/// Tallies plus the viewer's vote per suggestion
async fn votes_for<C: ConnectionTrait>(
    conn: &C,
    suggestion_ids: &[Uuid],
    viewer: Uuid,
) -> Result<HashMap<Uuid, (VoteTally, Option<i16>)>> {
    let rows: Vec<(Uuid, Uuid, i16)> = KaizenVoteEntity::find()
        .select_only()
        .column(KaizenVoteColumn::SuggestionId)
        .column(KaizenVoteColumn::PersonId)
        .column(KaizenVoteColumn::Value)
        .filter(KaizenVoteColumn::SuggestionId.is_in(suggestion_ids.iter().copied()))
        .into_tuple()
        .all(conn)
        .await?;

    let mut out: HashMap<Uuid, (VoteTally, Option<i16>)> = HashMap::new();
    for (suggestion_id, person_id, value) in rows {
        let slot = out.entry(suggestion_id).or_default();
        slot.0.add(value);
        if person_id == viewer {
            slot.1 = Some(value);
        }
    }
    Ok(out)
}

async fn with_votes<C: ConnectionTrait>(
    conn: &C,
    suggestions: Vec<KaizenSuggestion>,
    viewer: Uuid,
) -> Result<Vec<SuggestionWithVotes>> {
    let ids: Vec<Uuid> = suggestions.iter().map(|s| s.id).collect();
    let mut votes = votes_for(conn, &ids, viewer).await?;
    Ok(suggestions
        .into_iter()
        .map(|s| {
            let (tally, mine) = votes.remove(&s.id).unwrap_or_default();
            SuggestionWithVotes::new(s, tally, mine)
        })
        .collect())
}

async fn find_suggestion_in<C: ConnectionTrait>(
    conn: &C,
    org_id: Uuid,
    id: Uuid,
) -> Result<KaizenSuggestion> {
    KaizenSuggestionEntity::find_by_id(id)
        .filter(KaizenSuggestionColumn::OrgId.eq(org_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("suggestion", id))
}

async fn load_one<C: ConnectionTrait>(
    conn: &C,
    org_id: Uuid,
    id: Uuid,
    viewer: Uuid,
) -> Result<SuggestionWithVotes> {
    let suggestion = find_suggestion_in(conn, org_id, id).await?;
    let mut rows = with_votes(conn, vec![suggestion], viewer).await?;
    rows.pop().ok_or_else(|| AppError::not_found("suggestion", id))
}

fn ensure_open_for_votes(suggestion: &KaizenSuggestion) -> Result<()> {
    if suggestion.status.is_terminal() {
        Err(AppError::Validation {
            message: format!(
                "Suggestion is {} and no longer accepts votes",
                suggestion.status.label()
            ),
            field: Some("status".to_string()),
        })
    } else {
        Ok(())
    }
}

impl Repository {
    // ========================================================================
    // Kaizen Operations
    // ========================================================================

    /// Submit a suggestion. The author's upvote is cast in the same transaction.
    pub async fn create_suggestion(
        &self,
        org_id: Uuid,
        author: Uuid,
        suggestion: NewSuggestion,
    ) -> Result<SuggestionWithVotes> {
        let now = now();
        let id = Uuid::new_v4();

        let txn = self.write_conn().begin().await?;

        KaizenSuggestionActiveModel {
            id: Set(id),
            org_id: Set(org_id),
            title: Set(suggestion.title),
            description: Set(suggestion.description),
            category: Set(suggestion.category),
            expected_impact: Set(suggestion.expected_impact),
            author_person_id: Set(author),
            status: Set(KaizenStatus::Submitted),
            review_notes: Set(None),
            implemented_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        KaizenVoteEntity::insert(KaizenVoteActiveModel {
            suggestion_id: Set(id),
            person_id: Set(author),
            org_id: Set(org_id),
            value: Set(VoteValue::UP.get()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await?;

        let created = load_one(&txn, org_id, id, author).await?;
        txn.commit().await?;

        metrics::record_vote(VoteValue::UP.direction());
        info!(org_id = %org_id, suggestion_id = %id, "Kaizen suggestion submitted");
        Ok(created)
    }

    /// Find a suggestion with vote counts as seen by `viewer`
    pub async fn find_suggestion(
        &self,
        org_id: Uuid,
        id: Uuid,
        viewer: Uuid,
    ) -> Result<SuggestionWithVotes> {
        load_one(self.read_conn(), org_id, id, viewer).await
    }

    /// List suggestions, newest first or by net score
    pub async fn list_suggestions(
        &self,
        org_id: Uuid,
        status: Option<KaizenStatus>,
        by_score: bool,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<SuggestionWithVotes>> {
        let mut select =
            KaizenSuggestionEntity::find().filter(KaizenSuggestionColumn::OrgId.eq(org_id));
        if let Some(status) = status {
            select = select.filter(KaizenSuggestionColumn::Status.eq(status));
        }
        let select = select.order_by_desc(KaizenSuggestionColumn::CreatedAt);

        if !by_score {
            let total = select.clone().count(self.read_conn()).await?;
            let rows = select
                .offset(page.offset)
                .limit(page.limit)
                .all(self.read_conn())
                .await?;
            return Ok(Page {
                items: with_votes(self.read_conn(), rows, viewer).await?,
                total,
                limit: page.limit,
                offset: page.offset,
            });
        }

        // score is derived from vote rows, so ranking happens in memory
        let rows = select.all(self.read_conn()).await?;
        let mut ranked = with_votes(self.read_conn(), rows, viewer).await?;
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.suggestion.created_at.cmp(&a.suggestion.created_at))
        });
        let total = ranked.len() as u64;
        let items = ranked
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Every suggestion of the organization, for summaries
    pub async fn all_suggestions(&self, org_id: Uuid) -> Result<Vec<KaizenSuggestion>> {
        KaizenSuggestionEntity::find()
            .filter(KaizenSuggestionColumn::OrgId.eq(org_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Edit the text of a suggestion: its author only, while still submitted
    pub async fn update_suggestion_details(
        &self,
        org_id: Uuid,
        id: Uuid,
        actor: Uuid,
        changes: SuggestionChanges,
    ) -> Result<SuggestionWithVotes> {
        self.update_suggestion(org_id, id, actor, Some(changes), None)
            .await
    }

    /// Move a suggestion through review. `implemented` stamps `implemented_at`.
    pub async fn change_suggestion_status(
        &self,
        org_id: Uuid,
        id: Uuid,
        viewer: Uuid,
        status: KaizenStatus,
        review_notes: Option<String>,
    ) -> Result<SuggestionWithVotes> {
        let review = SuggestionReview {
            status,
            review_notes,
        };
        self.update_suggestion(org_id, id, viewer, None, Some(review))
            .await
    }

    /// Apply detail edits and a review move as one guarded write.
    ///
    /// Every rule is checked against the row as loaded before anything is
    /// written, so a rejected request leaves the suggestion untouched.
    pub async fn update_suggestion(
        &self,
        org_id: Uuid,
        id: Uuid,
        actor: Uuid,
        details: Option<SuggestionChanges>,
        review: Option<SuggestionReview>,
    ) -> Result<SuggestionWithVotes> {
        let suggestion = find_suggestion_in(self.write_conn(), org_id, id).await?;

        let now = now();
        let mut update = KaizenSuggestionActiveModel {
            updated_at: Set(now),
            ..Default::default()
        };

        if let Some(changes) = details {
            if suggestion.author_person_id != actor {
                return Err(AppError::Forbidden {
                    message: "Only the author can edit a suggestion".to_string(),
                });
            }
            if suggestion.status != KaizenStatus::Submitted {
                return Err(AppError::Validation {
                    message: "Only submitted suggestions can be edited".to_string(),
                    field: Some("status".to_string()),
                });
            }
            if let Some(title) = changes.title {
                update.title = Set(title);
            }
            if let Some(description) = changes.description {
                update.description = Set(description);
            }
            if let Some(category) = changes.category {
                update.category = Set(category);
            }
            if let Some(impact) = changes.expected_impact {
                update.expected_impact = Set(impact);
            }
        }

        let mut next_status = None;
        if let Some(review) = review {
            next_status = resolve_status(suggestion.status, Some(review.status))?;
            if let Some(next) = next_status {
                update.status = Set(next);
                if next == KaizenStatus::Implemented {
                    update.implemented_at = Set(Some(now));
                }
            }
            if let Some(notes) = review.review_notes {
                update.review_notes = Set(Some(notes));
            }
        }

        let result = KaizenSuggestionEntity::update_many()
            .set(update)
            .filter(KaizenSuggestionColumn::Id.eq(id))
            .filter(KaizenSuggestionColumn::OrgId.eq(org_id))
            .filter(KaizenSuggestionColumn::Status.eq(suggestion.status))
            .exec(self.write_conn())
            .await?;
        ensure_applied(result.rows_affected, "suggestion")?;
        record_status_change(next_status);

        if let Some(next) = next_status {
            info!(org_id = %org_id, suggestion_id = %id, status = %next.label(), "Suggestion reviewed");
        }
        load_one(self.write_conn(), org_id, id, actor).await
    }

    /// Cast or change the caller's vote: one row per (suggestion, person)
    pub async fn cast_vote(
        &self,
        org_id: Uuid,
        id: Uuid,
        person_id: Uuid,
        value: VoteValue,
    ) -> Result<SuggestionWithVotes> {
        let txn = self.write_conn().begin().await?;

        let suggestion = find_suggestion_in(&txn, org_id, id).await?;
        ensure_open_for_votes(&suggestion)?;

        let now = now();
        KaizenVoteEntity::insert(KaizenVoteActiveModel {
            suggestion_id: Set(id),
            person_id: Set(person_id),
            org_id: Set(org_id),
            value: Set(value.get()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([KaizenVoteColumn::SuggestionId, KaizenVoteColumn::PersonId])
                .update_columns([KaizenVoteColumn::Value, KaizenVoteColumn::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        let updated = load_one(&txn, org_id, id, person_id).await?;
        txn.commit().await?;

        metrics::record_vote(value.direction());
        Ok(updated)
    }

    /// Withdraw the caller's vote; withdrawing twice is a no-op
    pub async fn withdraw_vote(
        &self,
        org_id: Uuid,
        id: Uuid,
        person_id: Uuid,
    ) -> Result<SuggestionWithVotes> {
        let txn = self.write_conn().begin().await?;

        let suggestion = find_suggestion_in(&txn, org_id, id).await?;
        ensure_open_for_votes(&suggestion)?;

        KaizenVoteEntity::delete_many()
            .filter(KaizenVoteColumn::SuggestionId.eq(id))
            .filter(KaizenVoteColumn::PersonId.eq(person_id))
            .exec(&txn)
            .await?;

        let updated = load_one(&txn, org_id, id, person_id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Raw tally for one suggestion
    pub async fn vote_tally(&self, org_id: Uuid, id: Uuid) -> Result<VoteTally> {
        find_suggestion_in(self.read_conn(), org_id, id).await?;
        let values: Vec<i16> = KaizenVoteEntity::find()
            .select_only()
            .column(KaizenVoteColumn::Value)
            .filter(KaizenVoteColumn::SuggestionId.eq(id))
            .into_tuple()
            .all(self.read_conn())
            .await?;
        Ok(voting::tally(values))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::NewPerson;
    use super::*;

    fn idea(title: &str) -> NewSuggestion {
        NewSuggestion {
            title: title.into(),
            description: "Move the printer next to the staff room".into(),
            category: Some("facilities".into()),
            expected_impact: None,
        }
    }

    async fn member(repo: &Repository, org_id: Uuid, name: &str) -> Person {
        repo.create_person(
            org_id,
            NewPerson {
                name: name.into(),
                email: format!("{}@test", name),
                role: PersonRole::Member,
            },
        )
        .await
        .unwrap()
        .0
    }

    #[tokio::test]
    async fn test_author_upvote_is_automatic() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;

        let created = repo.create_suggestion(t.org.id, t.owner.id, idea("Printer")).await.unwrap();
        assert_eq!(created.upvotes, 1);
        assert_eq!(created.downvotes, 0);
        assert_eq!(created.score, 1);
        assert_eq!(created.my_vote, Some(1));
        assert_eq!(created.suggestion.status, KaizenStatus::Submitted);
    }

    #[tokio::test]
    async fn test_net_score_after_votes_changes_and_withdrawals() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let s = repo.create_suggestion(t.org.id, t.owner.id, idea("Printer")).await.unwrap();
        let id = s.suggestion.id;

        let a = member(&repo, t.org.id, "a").await;
        let b = member(&repo, t.org.id, "b").await;
        let c = member(&repo, t.org.id, "c").await;

        repo.cast_vote(t.org.id, id, a.id, VoteValue::DOWN).await.unwrap();
        repo.cast_vote(t.org.id, id, b.id, VoteValue::DOWN).await.unwrap();
        repo.cast_vote(t.org.id, id, c.id, VoteValue::UP).await.unwrap();
        // a changes their mind, c withdraws, b repeats the same vote
        repo.cast_vote(t.org.id, id, a.id, VoteValue::UP).await.unwrap();
        repo.withdraw_vote(t.org.id, id, c.id).await.unwrap();
        let seen_by_b = repo.cast_vote(t.org.id, id, b.id, VoteValue::DOWN).await.unwrap();

        // owner +1, a +1, b -1
        assert_eq!(seen_by_b.upvotes, 2);
        assert_eq!(seen_by_b.downvotes, 1);
        assert_eq!(seen_by_b.score, 1);
        assert_eq!(seen_by_b.my_vote, Some(-1));

        let tally = repo.vote_tally(t.org.id, id).await.unwrap();
        assert_eq!(tally.net(), seen_by_b.score);

        let seen_by_c = repo.find_suggestion(t.org.id, id, c.id).await.unwrap();
        assert_eq!(seen_by_c.my_vote, None);
    }

    #[tokio::test]
    async fn test_terminal_suggestion_rejects_votes() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let s = repo.create_suggestion(t.org.id, t.owner.id, idea("Printer")).await.unwrap();
        let id = s.suggestion.id;

        let rejected = repo
            .change_suggestion_status(
                t.org.id,
                id,
                t.owner.id,
                KaizenStatus::Rejected,
                Some("Out of budget".into()),
            )
            .await
            .unwrap();
        assert_eq!(rejected.suggestion.review_notes.as_deref(), Some("Out of budget"));

        assert!(matches!(
            repo.cast_vote(t.org.id, id, t.owner.id, VoteValue::DOWN).await,
            Err(AppError::Validation { .. })
        ));
        assert_eq!(repo.vote_tally(t.org.id, id).await.unwrap().net(), 1);
    }

    #[tokio::test]
    async fn test_review_flow_stamps_implemented_at() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let id = repo
            .create_suggestion(t.org.id, t.owner.id, idea("Printer"))
            .await
            .unwrap()
            .suggestion
            .id;

        assert!(matches!(
            repo.change_suggestion_status(t.org.id, id, t.owner.id, KaizenStatus::Implemented, None)
                .await,
            Err(AppError::InvalidTransition { .. })
        ));

        for status in [KaizenStatus::UnderReview, KaizenStatus::Approved, KaizenStatus::Implemented] {
            repo.change_suggestion_status(t.org.id, id, t.owner.id, status, None)
                .await
                .unwrap();
        }
        let done = repo.find_suggestion(t.org.id, id, t.owner.id).await.unwrap();
        assert_eq!(done.suggestion.status, KaizenStatus::Implemented);
        assert!(done.suggestion.implemented_at.is_some());
    }

    #[tokio::test]
    async fn test_only_author_edits_submitted() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let other = member(&repo, t.org.id, "other").await;
        let id = repo
            .create_suggestion(t.org.id, t.owner.id, idea("Printer"))
            .await
            .unwrap()
            .suggestion
            .id;

        let changes = SuggestionChanges {
            title: Some("Printer move".into()),
            ..Default::default()
        };
        assert!(matches!(
            repo.update_suggestion_details(t.org.id, id, other.id, changes.clone()).await,
            Err(AppError::Forbidden { .. })
        ));
        let edited = repo
            .update_suggestion_details(t.org.id, id, t.owner.id, changes)
            .await
            .unwrap();
        assert_eq!(edited.suggestion.title, "Printer move");
    }

    #[tokio::test]
    async fn test_rejected_review_keeps_edits_out() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let id = repo
            .create_suggestion(t.org.id, t.owner.id, idea("Printer"))
            .await
            .unwrap()
            .suggestion
            .id;

        let changes = SuggestionChanges {
            title: Some("Printer move".into()),
            ..Default::default()
        };
        let review = SuggestionReview {
            status: KaizenStatus::Implemented,
            review_notes: Some("done".into()),
        };
        assert!(matches!(
            repo.update_suggestion(t.org.id, id, t.owner.id, Some(changes.clone()), Some(review))
                .await,
            Err(AppError::InvalidTransition { .. })
        ));

        let unchanged = repo.find_suggestion(t.org.id, id, t.owner.id).await.unwrap();
        assert_eq!(unchanged.suggestion.title, "Printer");
        assert_eq!(unchanged.suggestion.status, KaizenStatus::Submitted);
        assert_eq!(unchanged.suggestion.review_notes, None);

        let review = SuggestionReview {
            status: KaizenStatus::UnderReview,
            review_notes: None,
        };
        let both = repo
            .update_suggestion(t.org.id, id, t.owner.id, Some(changes), Some(review))
            .await
            .unwrap();
        assert_eq!(both.suggestion.title, "Printer move");
        assert_eq!(both.suggestion.status, KaizenStatus::UnderReview);
    }

    #[tokio::test]
    async fn test_sort_by_score() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;
        let a = member(&repo, t.org.id, "a").await;

        let low = repo.create_suggestion(t.org.id, t.owner.id, idea("Low")).await.unwrap();
        let high = repo.create_suggestion(t.org.id, t.owner.id, idea("High")).await.unwrap();
        repo.cast_vote(t.org.id, low.suggestion.id, a.id, VoteValue::DOWN).await.unwrap();
        repo.cast_vote(t.org.id, high.suggestion.id, a.id, VoteValue::UP).await.unwrap();

        let page = repo
            .list_suggestions(t.org.id, None, true, a.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].suggestion.id, high.suggestion.id);
        assert_eq!(page.items[0].score, 2);
        assert_eq!(page.items[1].score, 0);
    }

    #[tokio::test]
    async fn test_cross_tenant_vote_is_not_found() {
        let repo = repo().await;
        let north = tenant(&repo, "north").await;
        let south = tenant(&repo, "south").await;
        let s = repo.create_suggestion(north.org.id, north.owner.id, idea("Printer")).await.unwrap();

        assert!(matches!(
            repo.cast_vote(south.org.id, s.suggestion.id, south.owner.id, VoteValue::UP).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
