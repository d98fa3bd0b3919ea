use super::{now, paginate, Page, PageRequest, Repository};
use crate::auth::{generate_api_key, hash_api_key};
use crate::db::models::*;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub name: String,
    pub email: String,
    pub role: PersonRole,
}

#[derive(Debug, Clone, Default)]
pub struct PersonChanges {
    pub name: Option<String>,
    pub role: Option<PersonRole>,
    pub is_active: Option<bool>,
}

fn person_model(org_id: Uuid, person: NewPerson, api_key: &str) -> PersonActiveModel {
    let now = now();
    PersonActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org_id),
        name: Set(person.name),
        email: Set(person.email),
        role: Set(person.role),
        api_key_hash: Set(hash_api_key(api_key)),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

impl Repository {
    // ========================================================================
    // Organization Operations
    // ========================================================================

    /// Create an organization together with its first person.
    ///
    /// Returns the plaintext API key of that person; it is not stored.
    pub async fn create_organization(
        &self,
        name: String,
        slug: String,
        owner: NewPerson,
    ) -> Result<(Organization, Person, String)> {
        let taken = OrganizationEntity::find()
            .filter(OrganizationColumn::Slug.eq(slug.as_str()))
            .one(self.write_conn())
            .await?;
        if taken.is_some() {
            return Err(AppError::Duplicate {
                message: format!("Organization slug '{}' is already taken", slug),
            });
        }

        let now = now();
        let org_id = Uuid::new_v4();
        let api_key = generate_api_key();

        let txn = self.write_conn().begin().await?;

        let org = OrganizationActiveModel {
            id: Set(org_id),
            name: Set(name),
            slug: Set(slug),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let owner = person_model(org_id, owner, &api_key).insert(&txn).await?;

        txn.commit().await?;

        Ok((org, owner, api_key))
    }

    /// Find an organization by ID
    pub async fn find_organization(&self, org_id: Uuid) -> Result<Organization> {
        OrganizationEntity::find_by_id(org_id)
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("organization", org_id))
    }

    // ========================================================================
    // Person Operations
    // ========================================================================

    /// Resolve an API key hash to an active person of an active organization
    pub async fn find_person_by_api_key_hash(
        &self,
        hash: &str,
    ) -> Result<Option<(Person, Organization)>> {
        let found = PersonEntity::find()
            .filter(PersonColumn::ApiKeyHash.eq(hash))
            .filter(PersonColumn::IsActive.eq(true))
            .find_also_related(OrganizationEntity)
            .one(self.read_conn())
            .await?;

        Ok(match found {
            Some((person, Some(org))) if org.is_active => Some((person, org)),
            _ => None,
        })
    }

    /// Find a person by ID within an organization
    pub async fn find_person(&self, org_id: Uuid, id: Uuid) -> Result<Person> {
        PersonEntity::find_by_id(id)
            .filter(PersonColumn::OrgId.eq(org_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("person", id))
    }

    /// List people of an organization
    pub async fn list_people(&self, org_id: Uuid, page: PageRequest) -> Result<Page<Person>> {
        let select = PersonEntity::find()
            .filter(PersonColumn::OrgId.eq(org_id))
            .order_by_asc(PersonColumn::Name);
        paginate(self.read_conn(), select, page).await
    }

    /// Add a person to an organization, returning their API key
    pub async fn create_person(
        &self,
        org_id: Uuid,
        person: NewPerson,
    ) -> Result<(Person, String)> {
        let api_key = generate_api_key();
        let person = person_model(org_id, person, &api_key)
            .insert(self.write_conn())
            .await?;
        Ok((person, api_key))
    }

    /// Update a person. Only an owner may change another owner, or grant ownership.
    pub async fn update_person(
        &self,
        org_id: Uuid,
        actor_role: PersonRole,
        id: Uuid,
        changes: PersonChanges,
    ) -> Result<Person> {
        let person = PersonEntity::find_by_id(id)
            .filter(PersonColumn::OrgId.eq(org_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("person", id))?;

        let touches_ownership = person.role == PersonRole::Owner
            && (changes.role.is_some_and(|r| r != PersonRole::Owner)
                || changes.is_active == Some(false));
        let grants_ownership =
            changes.role == Some(PersonRole::Owner) && person.role != PersonRole::Owner;
        if actor_role != PersonRole::Owner && (touches_ownership || grants_ownership) {
            return Err(AppError::Forbidden {
                message: "Only an owner can change ownership".to_string(),
            });
        }

        let mut active: PersonActiveModel = person.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(role) = changes.role {
            active.role = Set(role);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(now());

        active.update(self.write_conn()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_organization_slug_is_unique() {
        let repo = repo().await;
        tenant(&repo, "north").await;

        let err = repo
            .create_organization(
                "Other".into(),
                "north".into(),
                NewPerson {
                    name: "X".into(),
                    email: "x@test".into(),
                    role: PersonRole::Owner,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_api_key_resolves_to_person() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;

        let (member, key) = assert_ok!(
            repo.create_person(
                t.org.id,
                NewPerson {
                    name: "Member".into(),
                    email: "m@north.test".into(),
                    role: PersonRole::Member,
                },
            )
            .await
        );

        let (person, org) = repo
            .find_person_by_api_key_hash(&hash_api_key(&key))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(person.id, member.id);
        assert_eq!(org.id, t.org.id);

        assert!(repo
            .find_person_by_api_key_hash(&hash_api_key("ck_nope"))
            .await
            .unwrap()
            .is_none());

        // deactivated people cannot open sessions
        repo.update_person(
            t.org.id,
            PersonRole::Owner,
            member.id,
            PersonChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(repo
            .find_person_by_api_key_hash(&hash_api_key(&key))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_people_are_scoped_to_their_org() {
        let repo = repo().await;
        let north = tenant(&repo, "north").await;
        let south = tenant(&repo, "south").await;

        let err = repo.find_person(south.org.id, north.owner.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        let page = repo.list_people(north.org.id, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_owner() {
        let repo = repo().await;
        let t = tenant(&repo, "north").await;

        let err = repo
            .update_person(
                t.org.id,
                PersonRole::Admin,
                t.owner.id,
                PersonChanges {
                    role: Some(PersonRole::Member),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let renamed = repo
            .update_person(
                t.org.id,
                PersonRole::Admin,
                t.owner.id,
                PersonChanges {
                    name: Some("Founder".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Founder");
        assert_eq!(renamed.role, PersonRole::Owner);
    }
}
