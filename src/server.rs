//! HTTP surface: JSON routes over the commands.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{PasswordChange, ProfileUpdate};
use crate::commands::{self, CommandError, DeleteResult, LoginRequest, ModeRequest, NetworkRequest, SettingUpdate};
use crate::connection::ConnectionStatus;
use crate::diagnostics::DiagnosticReport;
use crate::models::*;
use crate::repo::*;
use crate::AppState;

type Shared = State<Arc<AppState>>;
type ApiResult<T> = Result<Json<T>, CommandError>;

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
        .route("/api/connection", get(connection_status))
        .route("/api/connection/connect", post(connect))
        .route("/api/connection/offline", post(go_offline))
        .route("/api/connection/mode", put(set_mode))
        .route("/api/connection/network", post(network))
        .route("/api/connection/diagnostic", get(diagnostic))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/{id}", patch(update_order).delete(delete_order))
        .route("/api/quality", get(list_inspections).post(create_inspection))
        .route("/api/quality/stats", get(quality_stats))
        .route("/api/quality/{id}", patch(update_inspection))
        .route("/api/maintenance", get(list_maintenance).post(create_maintenance))
        .route("/api/maintenance/stats", get(maintenance_stats))
        .route("/api/maintenance/{id}", patch(update_maintenance).delete(delete_maintenance))
        .route("/api/equipment", get(list_equipment).post(create_equipment))
        .route("/api/equipment/{id}", patch(update_equipment).delete(delete_equipment))
        .route("/api/lines", get(list_lines))
        .route("/api/traceability", get(list_traceability).post(create_traceability))
        .route("/api/traceability/batch/{batch}", get(search_batch))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/{id}/read", post(mark_alert_read))
        .route("/api/alerts/{id}/resolve", post(resolve_alert))
        .route("/api/settings", get(list_settings))
        .route("/api/settings/{key}", put(update_setting))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", patch(update_user).delete(delete_user))
        .route("/api/profile", put(update_profile))
        .route("/api/profile/password", put(change_password))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until the listener fails
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).await
}

async fn health(State(state): Shared) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "online": state.connection.is_online(),
    }))
}

// Session and profile

async fn login(State(state): Shared, Json(body): Json<LoginRequest>) -> ApiResult<User> {
    Ok(Json(commands::login(&state, &body)?))
}

async fn logout(State(state): Shared) -> Result<StatusCode, CommandError> {
    commands::logout(&state)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(State(state): Shared) -> ApiResult<Option<User>> {
    Ok(Json(commands::session(&state)?))
}

async fn update_profile(State(state): Shared, Json(body): Json<ProfileUpdate>) -> ApiResult<User> {
    Ok(Json(commands::update_profile(&state, &body)?))
}

async fn change_password(State(state): Shared, Json(body): Json<PasswordChange>) -> Result<StatusCode, CommandError> {
    commands::change_password(&state, &body)?;
    Ok(StatusCode::NO_CONTENT)
}

// Connection

async fn connection_status(State(state): Shared) -> Json<ConnectionStatus> {
    Json(commands::connection_status(&state))
}

async fn connect(State(state): Shared) -> ApiResult<ConnectionStatus> {
    Ok(Json(commands::connect(&state).await?))
}

async fn go_offline(State(state): Shared) -> ApiResult<ConnectionStatus> {
    Ok(Json(commands::go_offline(&state)?))
}

async fn set_mode(State(state): Shared, Json(body): Json<ModeRequest>) -> ApiResult<ConnectionStatus> {
    Ok(Json(commands::set_connection_mode(&state, &body)?))
}

async fn network(State(state): Shared, Json(body): Json<NetworkRequest>) -> ApiResult<ConnectionStatus> {
    Ok(Json(commands::network_changed(&state, &body).await?))
}

async fn diagnostic(State(state): Shared) -> ApiResult<DiagnosticReport> {
    Ok(Json(commands::diagnostic(&state).await?))
}

// Production orders

async fn list_orders(State(state): Shared) -> ApiResult<Vec<ProductionOrderView>> {
    Ok(Json(commands::list_orders(&state).await?))
}

async fn create_order(State(state): Shared, Json(body): Json<NewProductionOrder>) -> ApiResult<Saved<ProductionOrder>> {
    Ok(Json(commands::create_order(&state, body).await?))
}

async fn update_order(
    State(state): Shared,
    Path(id): Path<String>,
    Json(body): Json<OrderPatch>,
) -> ApiResult<Saved<ProductionOrder>> {
    Ok(Json(commands::update_order(&state, &id, &body).await?))
}

async fn delete_order(State(state): Shared, Path(id): Path<String>) -> ApiResult<DeleteResult> {
    Ok(Json(commands::delete_order(&state, &id).await?))
}

// Quality

async fn list_inspections(State(state): Shared) -> ApiResult<Vec<QualityInspectionView>> {
    Ok(Json(commands::list_inspections(&state).await?))
}

async fn create_inspection(State(state): Shared, Json(body): Json<NewInspection>) -> ApiResult<Saved<QualityInspection>> {
    Ok(Json(commands::create_inspection(&state, body).await?))
}

async fn update_inspection(
    State(state): Shared,
    Path(id): Path<String>,
    Json(body): Json<InspectionPatch>,
) -> ApiResult<Saved<QualityInspection>> {
    Ok(Json(commands::update_inspection(&state, &id, &body).await?))
}

async fn quality_stats(State(state): Shared) -> ApiResult<QualityStats> {
    Ok(Json(commands::quality_stats(&state).await?))
}

// Maintenance

async fn list_maintenance(State(state): Shared) -> ApiResult<Vec<MaintenanceOrderView>> {
    Ok(Json(commands::list_maintenance(&state).await?))
}

async fn create_maintenance(
    State(state): Shared,
    Json(body): Json<NewMaintenanceOrder>,
) -> ApiResult<Saved<MaintenanceOrder>> {
    Ok(Json(commands::create_maintenance(&state, body).await?))
}

async fn update_maintenance(
    State(state): Shared,
    Path(id): Path<String>,
    Json(body): Json<MaintenancePatch>,
) -> ApiResult<Saved<MaintenanceOrder>> {
    Ok(Json(commands::update_maintenance(&state, &id, &body).await?))
}

async fn delete_maintenance(State(state): Shared, Path(id): Path<String>) -> ApiResult<DeleteResult> {
    Ok(Json(commands::delete_maintenance(&state, &id).await?))
}

async fn maintenance_stats(State(state): Shared) -> ApiResult<MaintenanceStats> {
    Ok(Json(commands::maintenance_stats(&state).await?))
}

// Equipment and lines

async fn list_equipment(State(state): Shared) -> ApiResult<Vec<EquipmentView>> {
    Ok(Json(commands::list_equipment(&state).await?))
}

async fn create_equipment(State(state): Shared, Json(body): Json<NewEquipment>) -> ApiResult<Saved<Equipment>> {
    Ok(Json(commands::create_equipment(&state, body).await?))
}

async fn update_equipment(
    State(state): Shared,
    Path(id): Path<String>,
    Json(body): Json<EquipmentPatch>,
) -> ApiResult<Saved<Equipment>> {
    Ok(Json(commands::update_equipment(&state, &id, &body).await?))
}

async fn delete_equipment(State(state): Shared, Path(id): Path<String>) -> ApiResult<DeleteResult> {
    Ok(Json(commands::delete_equipment(&state, &id).await?))
}

async fn list_lines(State(state): Shared) -> ApiResult<Vec<ProductionLine>> {
    Ok(Json(commands::list_lines(&state).await?))
}

// Traceability

async fn list_traceability(State(state): Shared) -> ApiResult<Vec<TraceabilityRecordView>> {
    Ok(Json(commands::list_traceability(&state).await?))
}

async fn create_traceability(
    State(state): Shared,
    Json(body): Json<NewTraceabilityRecord>,
) -> ApiResult<Saved<TraceabilityRecord>> {
    Ok(Json(commands::create_traceability(&state, body).await?))
}

async fn search_batch(State(state): Shared, Path(batch): Path<String>) -> ApiResult<Vec<TraceabilityRecordView>> {
    Ok(Json(commands::search_batch(&state, &batch).await?))
}

// Alerts

async fn list_alerts(State(state): Shared) -> ApiResult<Vec<AIAlertView>> {
    Ok(Json(commands::list_alerts(&state).await?))
}

async fn mark_alert_read(State(state): Shared, Path(id): Path<String>) -> ApiResult<Saved<AIAlert>> {
    Ok(Json(commands::mark_alert_read(&state, &id).await?))
}

async fn resolve_alert(State(state): Shared, Path(id): Path<String>) -> ApiResult<Saved<AIAlert>> {
    Ok(Json(commands::resolve_alert(&state, &id).await?))
}

// Settings

async fn list_settings(State(state): Shared) -> ApiResult<Vec<SystemSetting>> {
    Ok(Json(commands::list_settings(&state).await?))
}

async fn update_setting(
    State(state): Shared,
    Path(key): Path<String>,
    Json(body): Json<SettingUpdate>,
) -> ApiResult<Saved<SystemSetting>> {
    Ok(Json(commands::update_setting(&state, &key, &body).await?))
}

// Users

async fn list_users(State(state): Shared) -> ApiResult<Vec<User>> {
    Ok(Json(commands::list_users(&state).await?))
}

async fn create_user(State(state): Shared, Json(body): Json<NewUser>) -> ApiResult<Saved<User>> {
    Ok(Json(commands::create_user(&state, body).await?))
}

async fn update_user(
    State(state): Shared,
    Path(id): Path<String>,
    Json(body): Json<UserPatch>,
) -> ApiResult<Saved<User>> {
    Ok(Json(commands::update_user(&state, &id, &body).await?))
}

async fn delete_user(State(state): Shared, Path(id): Path<String>) -> ApiResult<DeleteResult> {
    Ok(Json(commands::delete_user(&state, &id).await?))
}
