//! Authentication Module
//!
//! Handles credential checks, password hashes and the signed-in session.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::User;
use crate::repo::{RepoError, UsersRepo};
use crate::seed;
use crate::storage::{LocalStore, StorageError};
use crate::validation::{self, ValidationError};

/// Storage key of the persisted session user
pub const SESSION_KEY: &str = "user";
/// Storage key of the email → password hash map
pub const PASSWORDS_KEY: &str = "passwords";
/// Accepted for any roster user without a stored password
pub const DEFAULT_PASSWORD: &str = "123456";

const ADMIN_LOGIN: &str = "admin";
const ADMIN_PASSWORD: &str = "admin";

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Argon2 hashes of locally set passwords, keyed by email
pub struct PasswordStore<'a> {
    store: &'a LocalStore,
}

impl<'a> PasswordStore<'a> {
    pub fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    fn load(&self) -> HashMap<String, String> {
        match self.store.load(PASSWORDS_KEY) {
            Ok(map) => map,
            Err(StorageError::Missing(_)) => HashMap::new(),
            Err(e) => {
                warn!("Password map unreadable, treating as empty: {}", e);
                HashMap::new()
            }
        }
    }

    pub fn has(&self, email: &str) -> bool {
        self.load().contains_key(email)
    }

    pub fn set(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();

        let mut map = self.load();
        map.insert(email.to_string(), hash);
        self.store.save(PASSWORDS_KEY, &map)?;
        Ok(())
    }

    /// Check `password` against the stored hash, or the default password
    /// when none is stored for `email`
    pub fn verify(&self, email: &str, password: &str) -> bool {
        let map = self.load();
        let Some(stored) = map.get(email) else {
            return password == DEFAULT_PASSWORD;
        };

        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!("Stored hash for {} is malformed: {}", email, e);
                false
            }
        }
    }

    pub fn remove(&self, email: &str) -> Result<(), AuthError> {
        let mut map = self.load();
        if map.remove(email).is_some() {
            self.store.save(PASSWORDS_KEY, &map)?;
        }
        Ok(())
    }

    /// Move a stored hash to a new email
    pub fn rename(&self, from: &str, to: &str) -> Result<(), AuthError> {
        let mut map = self.load();
        if let Some(hash) = map.remove(from) {
            map.insert(to.to_string(), hash);
            self.store.save(PASSWORDS_KEY, &map)?;
        }
        Ok(())
    }
}

/// Resolve a login against the fixed admin credential and `roster`
pub fn authenticate(
    email: &str,
    password: &str,
    roster: &[User],
    passwords: &PasswordStore<'_>,
) -> Result<User, AuthError> {
    let login = email.trim();
    if login == ADMIN_LOGIN && password == ADMIN_PASSWORD {
        return Ok(seed::admin_user());
    }

    let login = login.to_lowercase();
    let user = roster
        .iter()
        .find(|u| u.email.to_lowercase() == login)
        .ok_or(AuthError::InvalidCredentials)?;

    if !passwords.verify(&user.email, password) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user.clone())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Manages authentication state
pub struct AuthManager {
    session: Option<User>,
}

impl AuthManager {
    /// Create a signed-out auth manager
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Pick up the session persisted by an earlier run
    pub fn restore(store: &LocalStore) -> Self {
        match store.load::<User>(SESSION_KEY) {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                Self { session: Some(user) }
            }
            Err(StorageError::Missing(_)) => Self::new(),
            Err(e) => {
                warn!("Stored session unreadable: {}", e);
                Self::new()
            }
        }
    }

    /// Set the current session
    pub fn set_session(&mut self, user: User) {
        info!("Session set for user: {}", user.id);
        self.session = Some(user);
    }

    pub fn get_session(&self) -> Option<&User> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.session.as_ref().is_some_and(User::is_admin)
    }

    /// Clear the current session
    pub fn clear_session(&mut self) {
        info!("Session cleared");
        self.session = None;
    }

    /// Check credentials against the offline roster and persist the session
    pub fn login(&mut self, store: &LocalStore, users: &UsersRepo<'_>, email: &str, password: &str) -> Result<User, AuthError> {
        let roster = users.offline_roster();
        let user = match authenticate(email, password, &roster, &PasswordStore::new(store)) {
            Ok(user) => user,
            Err(e) => {
                warn!("Failed login for {}", email.trim());
                return Err(e);
            }
        };

        store.save(SESSION_KEY, &user)?;
        self.set_session(user.clone());
        Ok(user)
    }

    pub fn logout(&mut self, store: &LocalStore) -> Result<(), AuthError> {
        store.delete(SESSION_KEY)?;
        self.clear_session();
        Ok(())
    }

    /// Rename or re-address the signed-in user
    pub fn update_profile(&mut self, store: &LocalStore, users: &UsersRepo<'_>, update: &ProfileUpdate) -> Result<User, AuthError> {
        let current = self.session.clone().ok_or(AuthError::NotAuthenticated)?;
        validation::required("name", &update.name)?;
        let email = validation::normalize_email(&update.email)?;

        if email != current.email.to_lowercase() {
            let taken = users
                .offline_roster()
                .iter()
                .any(|u| u.id != current.id && u.email.to_lowercase() == email);
            if taken {
                return Err(ValidationError::DuplicateEmail(email).into());
            }
            PasswordStore::new(store).rename(&current.email, &email)?;
        }

        let user = User {
            name: update.name.trim().to_string(),
            email,
            updated_at: Utc::now(),
            ..current
        };
        users.upsert_local(user.clone())?;
        store.save(SESSION_KEY, &user)?;
        self.set_session(user.clone());
        Ok(user)
    }

    pub fn change_password(&self, store: &LocalStore, change: &PasswordChange) -> Result<(), AuthError> {
        let user = self.session.as_ref().ok_or(AuthError::NotAuthenticated)?;
        if user.id.starts_with("admin-") {
            return Err(ValidationError::FixedAdminPassword.into());
        }
        let passwords = PasswordStore::new(store);

        if !passwords.verify(&user.email, &change.current_password) {
            return Err(ValidationError::WrongPassword.into());
        }
        validation::new_password(&change.new_password, &change.confirm_password)?;

        passwords.set(&user.email, &change.new_password)?;
        info!("Password changed for {}", user.email);
        Ok(())
    }
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}
