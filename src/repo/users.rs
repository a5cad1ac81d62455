//! User accounts
//!
//! The local `users` list only holds accounts registered or edited on this
//! machine; the fixture roster (or the remote table) is merged in on read.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{patch_object, DataSource, Entity, RepoError, Saved};
use crate::auth::{AuthError, PasswordStore};
use crate::models::{Role, User};
use crate::remote::Order;
use crate::seed;
use crate::validation::{self, ValidationError};

impl Entity for User {
    const TABLE: &'static str = "users";
    const ID_PREFIX: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn seed() -> Vec<Self> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
    pub confirm_password: String,
}

/// Admin edit of an account. An empty `password` leaves it unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Default, Serialize)]
struct UserFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

/// Overlay `local` on `base`, then drop later duplicates by email.
///
/// A local entry replaces the base entry sharing its id or email; local
/// entries matching nothing are appended.
pub fn merge_users(base: Vec<User>, local: Vec<User>) -> Vec<User> {
    let mut remaining = local;
    let mut merged: Vec<User> = base
        .into_iter()
        .map(|b| {
            let hit = remaining
                .iter()
                .position(|l| l.id == b.id || l.email.eq_ignore_ascii_case(&b.email));
            match hit {
                Some(i) => remaining.remove(i),
                None => b,
            }
        })
        .collect();
    merged.extend(remaining);

    let mut seen = HashSet::new();
    merged.retain(|u| seen.insert(u.email.to_lowercase()));
    merged
}

fn email_taken(roster: &[User], email: &str, except_id: Option<&str>) -> bool {
    roster
        .iter()
        .any(|u| Some(u.id.as_str()) != except_id && u.email.to_lowercase() == email)
}

pub struct UsersRepo<'a> {
    ds: &'a DataSource,
}

impl<'a> UsersRepo<'a> {
    pub(crate) fn new(ds: &'a DataSource) -> Self {
        Self { ds }
    }

    /// Accounts that can sign in by email. `admin-*` accounts are only
    /// reachable through the fixed admin credential, even once edited locally.
    pub fn offline_roster(&self) -> Vec<User> {
        let mut roster = self.directory();
        roster.retain(|u| !u.id.starts_with("admin-"));
        roster
    }

    /// Every known account, admin included, for resolving joined views
    pub fn directory(&self) -> Vec<User> {
        merge_users(seed::users(), self.ds.local::<User>())
    }

    pub async fn get_all(&self, online: bool) -> Vec<User> {
        let mut base = None;
        if online {
            base = self.ds.fetch_remote::<User>(User::TABLE, "*", Order::asc("name")).await;
        }
        merge_users(base.unwrap_or_else(seed::users), self.ds.local::<User>())
    }

    /// Put `user` in the local list, replacing its previous entry
    pub fn upsert_local(&self, user: User) -> Result<(), RepoError> {
        self.ds.mirror_add(user)
    }

    pub async fn create(&self, draft: NewUser, online: bool) -> Result<Saved<User>, AuthError> {
        validation::required("name", &draft.name)?;
        let email = validation::normalize_email(&draft.email)?;
        validation::new_password(&draft.password, &draft.confirm_password)?;

        if email_taken(&self.get_all(online).await, &email, None) {
            return Err(ValidationError::DuplicateEmail(email).into());
        }

        let now = Utc::now();
        let user = User {
            id: self.ds.next_id::<User>(),
            name: draft.name.trim().to_string(),
            email,
            role: draft.role,
            created_at: now,
            updated_at: now,
        };

        let saved = self.ds.insert(user, online).await?;
        PasswordStore::new(self.ds.store()).set(&saved.record.email, &draft.password)?;
        info!("Registered user {}", saved.record.email);
        Ok(saved)
    }

    pub async fn update(&self, id: &str, patch: &UserPatch, online: bool) -> Result<Saved<User>, AuthError> {
        let roster = self.get_all(online).await;
        let current = roster
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound { entity: User::TABLE, id: id.to_string() })?;

        let mut fields = UserFields { role: patch.role, ..Default::default() };
        if let Some(name) = &patch.name {
            validation::required("name", name)?;
            fields.name = Some(name.trim().to_string());
        }
        if let Some(email) = &patch.email {
            let email = validation::normalize_email(email)?;
            if email_taken(&roster, &email, Some(id)) {
                return Err(ValidationError::DuplicateEmail(email).into());
            }
            fields.email = Some(email);
        }

        let password = patch.password.as_deref().filter(|p| !p.is_empty());
        if let Some(password) = password {
            validation::new_password(password, patch.confirm_password.as_deref().unwrap_or(""))?;
        }

        // Seeded accounts become local once edited
        if !self.ds.local::<User>().iter().any(|u| u.id == id) {
            self.ds.mirror_add(current.clone())?;
        }

        let body = patch_object(User::TABLE, &fields, true)?;
        let saved = self.ds.patch::<User>(id, ("id", id), body, online).await?;

        let passwords = PasswordStore::new(self.ds.store());
        if saved.record.email != current.email {
            passwords.rename(&current.email, &saved.record.email)?;
        }
        if let Some(password) = password {
            passwords.set(&saved.record.email, password)?;
        }
        Ok(saved)
    }

    /// Remove the account and its stored password
    pub async fn delete(&self, id: &str, online: bool) -> Result<bool, AuthError> {
        let email = self
            .get_all(online)
            .await
            .into_iter()
            .find(|u| u.id == id)
            .map(|u| u.email);

        let offline = self.ds.remove::<User>(id, online).await?;
        if let Some(email) = email {
            PasswordStore::new(self.ds.store()).remove(&email)?;
        }
        Ok(offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authenticate;
    use crate::repo::test_support::*;

    fn person(id: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            name: id.into(),
            email: email.into(),
            role: Role::Operator,
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(email: &str) -> NewUser {
        NewUser {
            name: "Lucia Prado".into(),
            email: email.into(),
            role: Role::Quality,
            password: "lucia1".into(),
            confirm_password: "lucia1".into(),
        }
    }

    #[test]
    fn merge_overrides_and_dedups_by_email() {
        let base = vec![person("a", "a@x.com"), person("b", "b@x.com")];
        let local = vec![
            person("local-1", "A@x.com"),
            person("c", "c@x.com"),
            person("d", "c@x.com"),
        ];

        let merged = merge_users(base, local);
        let ids: Vec<&str> = merged.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["local-1", "b", "c"]);
    }

    #[test]
    fn offline_roster_hides_fixture_admin() {
        let (_dir, ds) = offline_source();
        let roster = ds.users().offline_roster();
        assert_eq!(roster.len(), 5);
        assert!(roster.iter().all(|u| !u.id.starts_with("admin-")));
    }

    #[tokio::test]
    async fn edited_admin_stays_out_of_login_roster() {
        let (_dir, ds) = offline_source();
        let patch = UserPatch { name: Some("Admin Renamed".into()), ..Default::default() };
        ds.users().update("admin-001", &patch, false).await.unwrap();
        assert_eq!(ds.local::<User>().len(), 1);

        let roster = ds.users().offline_roster();
        assert!(roster.iter().all(|u| u.id != "admin-001"));
        let passwords = PasswordStore::new(ds.store());
        assert!(authenticate("admin@capymes.com", "123456", &roster, &passwords).is_err());

        let directory = ds.users().directory();
        let admin = directory.iter().find(|u| u.id == "admin-001").unwrap();
        assert_eq!(admin.name, "Admin Renamed");
    }

    #[tokio::test]
    async fn create_validates_and_enables_login() {
        let (_dir, ds) = offline_source();

        let mut short = draft("lucia@capymes.com");
        short.password = "123".into();
        short.confirm_password = "123".into();
        assert!(matches!(
            ds.users().create(short, false).await,
            Err(AuthError::Validation(ValidationError::PasswordTooShort))
        ));

        assert!(matches!(
            ds.users().create(draft(" MARIA@capymes.com"), false).await,
            Err(AuthError::Validation(ValidationError::DuplicateEmail(_)))
        ));

        let saved = ds.users().create(draft(" Lucia@CapyMES.com "), false).await.unwrap();
        assert!(saved.offline);
        assert_eq!(saved.record.email, "lucia@capymes.com");

        let roster = ds.users().offline_roster();
        let passwords = PasswordStore::new(ds.store());
        assert!(authenticate("lucia@capymes.com", "lucia1", &roster, &passwords).is_ok());
        assert!(authenticate("lucia@capymes.com", "123456", &roster, &passwords).is_err());
    }

    #[tokio::test]
    async fn editing_seeded_user_copies_it_locally() {
        let (_dir, ds) = offline_source();
        let patch = UserPatch { role: Some(Role::Supervisor), ..Default::default() };

        let saved = ds.users().update("user-003", &patch, false).await.unwrap();
        assert_eq!(saved.record.role, Role::Supervisor);
        assert_eq!(ds.local::<User>().len(), 1);

        let all = ds.users().get_all(false).await;
        assert_eq!(all.len(), 6);
        assert_eq!(all.iter().find(|u| u.id == "user-003").map(|u| u.role), Some(Role::Supervisor));
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let (_dir, ds) = offline_source();
        let patch = UserPatch { email: Some("ana@capymes.com".into()), ..Default::default() };
        let err = ds.users().update("user-002", &patch, false).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(ValidationError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn delete_drops_account_and_password() {
        let (_dir, ds) = offline_source();
        let saved = ds.users().create(draft("lucia@capymes.com"), false).await.unwrap();

        ds.users().delete(&saved.record.id, false).await.unwrap();
        assert!(ds.local::<User>().is_empty());
        assert!(!PasswordStore::new(ds.store()).has("lucia@capymes.com"));
    }
}
