//! Commands Module
//!
//! View-facing operations. Every command except login and session lookup
//! needs a signed-in user; user administration and settings need an admin.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::auth::{AuthError, AuthManager, PasswordChange, ProfileUpdate};
use crate::connection::{ConnectionMode, ConnectionStatus};
use crate::diagnostics::{self, DiagnosticReport};
use crate::models::*;
use crate::repo::*;
use crate::validation::ValidationError;
use crate::AppState;

/// Errors surfaced to callers of the commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Administrator access required")]
    Forbidden,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Local storage failure: {0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl From<RepoError> for CommandError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound { .. } => CommandError::NotFound(e.to_string()),
            RepoError::InvalidPatch { .. } => CommandError::Invalid(e.to_string()),
            RepoError::Validation(v) => CommandError::Validation(v),
            RepoError::Storage(s) => {
                error!("Storage error: {}", s);
                CommandError::Storage(s.to_string())
            }
        }
    }
}

impl From<AuthError> for CommandError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => CommandError::InvalidCredentials,
            AuthError::NotAuthenticated => CommandError::Unauthorized,
            AuthError::Validation(v) => CommandError::Validation(v),
            AuthError::Repo(r) => r.into(),
            AuthError::Storage(s) => RepoError::Storage(s).into(),
            AuthError::Hash(msg) => CommandError::Internal(msg),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

// Request types

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: ConnectionMode,
}

#[derive(Debug, Deserialize)]
pub struct NetworkRequest {
    pub online: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettingUpdate {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: String,
    pub offline: bool,
}

// Helpers

fn auth(state: &AppState) -> CommandResult<std::sync::MutexGuard<'_, AuthManager>> {
    state
        .auth
        .lock()
        .map_err(|_| CommandError::Internal("auth state lock poisoned".into()))
}

/// The signed-in user, or `Unauthorized`
pub fn current_user(state: &AppState) -> CommandResult<User> {
    auth(state)?.get_session().cloned().ok_or(CommandError::Unauthorized)
}

pub fn require_admin(state: &AppState) -> CommandResult<User> {
    let user = current_user(state)?;
    if !user.is_admin() {
        return Err(CommandError::Forbidden);
    }
    Ok(user)
}

fn online(state: &AppState) -> bool {
    state.connection.is_online()
}

// Session

pub fn login(state: &AppState, request: &LoginRequest) -> CommandResult<User> {
    info!("Login attempt for {}", request.email.trim());
    let users = state.data.users();
    let user = auth(state)?.login(state.data.store(), &users, &request.email, &request.password)?;
    Ok(user)
}

pub fn logout(state: &AppState) -> CommandResult<()> {
    info!("Logging out");
    auth(state)?.logout(state.data.store())?;
    Ok(())
}

pub fn session(state: &AppState) -> CommandResult<Option<User>> {
    debug!("Getting session");
    Ok(auth(state)?.get_session().cloned())
}

pub fn update_profile(state: &AppState, update: &ProfileUpdate) -> CommandResult<User> {
    let users = state.data.users();
    let user = auth(state)?.update_profile(state.data.store(), &users, update)?;
    Ok(user)
}

pub fn change_password(state: &AppState, change: &PasswordChange) -> CommandResult<()> {
    auth(state)?.change_password(state.data.store(), change)?;
    Ok(())
}

// Connection

pub fn connection_status(state: &AppState) -> ConnectionStatus {
    state.connection.status()
}

pub async fn connect(state: &AppState) -> CommandResult<ConnectionStatus> {
    current_user(state)?;
    Ok(state.connection.attempt_connection().await)
}

pub fn go_offline(state: &AppState) -> CommandResult<ConnectionStatus> {
    current_user(state)?;
    state.connection.force_offline();
    Ok(state.connection.status())
}

pub fn set_connection_mode(state: &AppState, request: &ModeRequest) -> CommandResult<ConnectionStatus> {
    current_user(state)?;
    state.connection.set_mode(request.mode);
    Ok(state.connection.status())
}

/// Host network state reported by the client
pub async fn network_changed(state: &AppState, request: &NetworkRequest) -> CommandResult<ConnectionStatus> {
    current_user(state)?;
    state.connection.network_changed(request.online).await;
    Ok(state.connection.status())
}

pub async fn diagnostic(state: &AppState) -> CommandResult<DiagnosticReport> {
    current_user(state)?;
    Ok(diagnostics::run(state.data.api()).await)
}

// Production orders

pub async fn list_orders(state: &AppState) -> CommandResult<Vec<ProductionOrderView>> {
    current_user(state)?;
    Ok(state.data.orders().get_all(online(state)).await)
}

pub async fn create_order(state: &AppState, mut draft: NewProductionOrder) -> CommandResult<Saved<ProductionOrder>> {
    let user = current_user(state)?;
    draft.created_by.get_or_insert(user.id);
    Ok(state.data.orders().create(draft, online(state)).await?)
}

pub async fn update_order(state: &AppState, id: &str, patch: &OrderPatch) -> CommandResult<Saved<ProductionOrder>> {
    current_user(state)?;
    Ok(state.data.orders().update(id, patch, online(state)).await?)
}

pub async fn delete_order(state: &AppState, id: &str) -> CommandResult<DeleteResult> {
    current_user(state)?;
    let offline = state.data.orders().delete(id, online(state)).await?;
    Ok(DeleteResult { deleted: id.to_string(), offline })
}

// Quality

pub async fn list_inspections(state: &AppState) -> CommandResult<Vec<QualityInspectionView>> {
    current_user(state)?;
    Ok(state.data.quality().get_all(online(state)).await)
}

pub async fn create_inspection(state: &AppState, mut draft: NewInspection) -> CommandResult<Saved<QualityInspection>> {
    let user = current_user(state)?;
    draft.inspector_id.get_or_insert(user.id);
    Ok(state.data.quality().create(draft, online(state)).await?)
}

pub async fn update_inspection(
    state: &AppState,
    id: &str,
    patch: &InspectionPatch,
) -> CommandResult<Saved<QualityInspection>> {
    current_user(state)?;
    Ok(state.data.quality().update(id, patch, online(state)).await?)
}

pub async fn quality_stats(state: &AppState) -> CommandResult<QualityStats> {
    current_user(state)?;
    Ok(state.data.quality().stats(online(state)).await)
}

// Maintenance

pub async fn list_maintenance(state: &AppState) -> CommandResult<Vec<MaintenanceOrderView>> {
    current_user(state)?;
    Ok(state.data.maintenance().get_all(online(state)).await)
}

pub async fn create_maintenance(
    state: &AppState,
    mut draft: NewMaintenanceOrder,
) -> CommandResult<Saved<MaintenanceOrder>> {
    let user = current_user(state)?;
    draft.created_by.get_or_insert(user.id);
    Ok(state.data.maintenance().create(draft, online(state)).await?)
}

pub async fn update_maintenance(
    state: &AppState,
    id: &str,
    patch: &MaintenancePatch,
) -> CommandResult<Saved<MaintenanceOrder>> {
    current_user(state)?;
    Ok(state.data.maintenance().update(id, patch, online(state)).await?)
}

pub async fn delete_maintenance(state: &AppState, id: &str) -> CommandResult<DeleteResult> {
    current_user(state)?;
    let offline = state.data.maintenance().delete(id, online(state)).await?;
    Ok(DeleteResult { deleted: id.to_string(), offline })
}

pub async fn maintenance_stats(state: &AppState) -> CommandResult<MaintenanceStats> {
    current_user(state)?;
    Ok(state.data.maintenance().stats(online(state)).await)
}

// Equipment and lines

pub async fn list_equipment(state: &AppState) -> CommandResult<Vec<EquipmentView>> {
    current_user(state)?;
    Ok(state.data.equipment().get_all(online(state)).await)
}

pub async fn create_equipment(state: &AppState, draft: NewEquipment) -> CommandResult<Saved<Equipment>> {
    current_user(state)?;
    Ok(state.data.equipment().create(draft, online(state)).await?)
}

pub async fn update_equipment(state: &AppState, id: &str, patch: &EquipmentPatch) -> CommandResult<Saved<Equipment>> {
    current_user(state)?;
    Ok(state.data.equipment().update(id, patch, online(state)).await?)
}

pub async fn delete_equipment(state: &AppState, id: &str) -> CommandResult<DeleteResult> {
    current_user(state)?;
    let offline = state.data.equipment().delete(id, online(state)).await?;
    Ok(DeleteResult { deleted: id.to_string(), offline })
}

pub async fn list_lines(state: &AppState) -> CommandResult<Vec<ProductionLine>> {
    current_user(state)?;
    Ok(state.data.lines().get_all(online(state)).await)
}

// Traceability

pub async fn list_traceability(state: &AppState) -> CommandResult<Vec<TraceabilityRecordView>> {
    current_user(state)?;
    Ok(state.data.traceability().get_all(online(state)).await)
}

pub async fn create_traceability(
    state: &AppState,
    mut draft: NewTraceabilityRecord,
) -> CommandResult<Saved<TraceabilityRecord>> {
    let user = current_user(state)?;
    draft.operator_id.get_or_insert(user.id);
    Ok(state.data.traceability().create(draft, online(state)).await?)
}

pub async fn search_batch(state: &AppState, batch: &str) -> CommandResult<Vec<TraceabilityRecordView>> {
    current_user(state)?;
    Ok(state.data.traceability().get_by_batch(batch, online(state)).await)
}

// Alerts

pub async fn list_alerts(state: &AppState) -> CommandResult<Vec<AIAlertView>> {
    current_user(state)?;
    Ok(state.data.alerts().get_all(online(state)).await)
}

pub async fn mark_alert_read(state: &AppState, id: &str) -> CommandResult<Saved<AIAlert>> {
    current_user(state)?;
    Ok(state.data.alerts().mark_as_read(id, online(state)).await?)
}

pub async fn resolve_alert(state: &AppState, id: &str) -> CommandResult<Saved<AIAlert>> {
    let user = current_user(state)?;
    Ok(state.data.alerts().resolve(id, &user.id, online(state)).await?)
}

// Settings

pub async fn list_settings(state: &AppState) -> CommandResult<Vec<SystemSetting>> {
    current_user(state)?;
    Ok(state.data.settings().get_all(online(state)).await)
}

pub async fn update_setting(state: &AppState, key: &str, update: &SettingUpdate) -> CommandResult<Saved<SystemSetting>> {
    let admin = require_admin(state)?;
    info!("Setting {} changed by {}", key, admin.id);
    Ok(state.data.settings().update(key, &update.value, &admin.id, online(state)).await?)
}

// Users

pub async fn list_users(state: &AppState) -> CommandResult<Vec<User>> {
    require_admin(state)?;
    Ok(state.data.users().get_all(online(state)).await)
}

pub async fn create_user(state: &AppState, draft: NewUser) -> CommandResult<Saved<User>> {
    require_admin(state)?;
    Ok(state.data.users().create(draft, online(state)).await?)
}

pub async fn update_user(state: &AppState, id: &str, patch: &UserPatch) -> CommandResult<Saved<User>> {
    require_admin(state)?;
    Ok(state.data.users().update(id, patch, online(state)).await?)
}

pub async fn delete_user(state: &AppState, id: &str) -> CommandResult<DeleteResult> {
    let admin = require_admin(state)?;
    if admin.id == id {
        return Err(CommandError::Invalid("cannot delete the signed-in account".into()));
    }
    let offline = state.data.users().delete(id, online(state)).await?;
    Ok(DeleteResult { deleted: id.to_string(), offline })
}
