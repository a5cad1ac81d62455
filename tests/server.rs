use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use mes_dashboard_lib::auth::AuthManager;
use mes_dashboard_lib::connection::ConnectionMonitor;
use mes_dashboard_lib::remote::ApiClient;
use mes_dashboard_lib::repo::DataSource;
use mes_dashboard_lib::storage::LocalStore;
use mes_dashboard_lib::{server, AppState};

/// State over a temp store with a backend that refuses connections
fn offline_state() -> (TempDir, Arc<AppState>) {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path().join("store")).unwrap();
    let api = ApiClient::new("http://127.0.0.1:9", "anon-key", Duration::from_secs(2), Duration::from_secs(2)).unwrap();
    let monitor = ConnectionMonitor::new(Arc::new(api.clone()), Duration::from_secs(2), Duration::from_secs(30));
    let state = AppState::new(DataSource::new(api, store), monitor, AuthManager::new());
    (dir, Arc::new(state))
}

async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = server::router(state.clone())
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn login(state: &Arc<AppState>, email: &str, password: &str) -> StatusCode {
    let body = json!({ "email": email, "password": password });
    call(state, "POST", "/api/auth/login", Some(body)).await.0
}

#[tokio::test]
async fn health_needs_no_session() {
    let (_dir, state) = offline_state();
    let (status, body) = call(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["online"], false);
}

#[tokio::test]
async fn data_routes_require_login() {
    let (_dir, state) = offline_state();
    let (status, body) = call(&state, "GET", "/api/orders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    assert_eq!(login(&state, "maria@capymes.com", "wrong").await, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&state, "maria@capymes.com", "123456").await, StatusCode::OK);

    let (_, session) = call(&state, "GET", "/api/auth/session", None).await;
    assert_eq!(session["id"], "user-002");
}

#[tokio::test]
async fn offline_order_lifecycle() {
    let (_dir, state) = offline_state();
    login(&state, "joao@capymes.com", "123456").await;

    let (_, orders) = call(&state, "GET", "/api/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 3);
    assert_eq!(orders[0]["production_line"]["id"], "line-001");

    let draft = json!({ "product_name": "Produto Delta", "quantity": 40, "priority": "Alta" });
    let (status, saved) = call(&state, "POST", "/api/orders", Some(draft)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["offline"], true);
    assert_eq!(saved["record"]["created_by"], "user-001");
    assert_eq!(saved["record"]["status"], "Pendente");
    let id = saved["record"]["id"].as_str().unwrap().to_string();

    let patch = json!({ "status": "Em produção", "produced_quantity": 10 });
    let (status, updated) = call(&state, "PATCH", &format!("/api/orders/{id}"), Some(patch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["record"]["produced_quantity"], 10);

    let (status, _) = call(&state, "DELETE", &format!("/api/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, orders) = call(&state, "GET", "/api/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let (_dir, state) = offline_state();
    login(&state, "ana@capymes.com", "123456").await;

    let (status, _) = call(&state, "PATCH", "/api/orders/po-404", Some(json!({ "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let inspection = json!({ "inspection_type": "Visual", "sample_size": 5, "defects_found": 9 });
    let (status, body) = call(&state, "POST", "/api/quality", Some(inspection)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("exceed"));

    let (status, _) = call(&state, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_users_and_settings() {
    let (_dir, state) = offline_state();
    assert_eq!(login(&state, "admin", "admin").await, StatusCode::OK);

    let (_, users) = call(&state, "GET", "/api/users", None).await;
    assert_eq!(users.as_array().unwrap().len(), 6);

    let draft = json!({
        "name": "Rita Lima",
        "email": "rita@capymes.com",
        "role": "operator",
        "password": "rita123",
        "confirm_password": "rita123"
    });
    let (status, _) = call(&state, "POST", "/api/users", Some(draft.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&state, "POST", "/api/users", Some(draft)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, saved) = call(&state, "PUT", "/api/settings/shift_duration", Some(json!({ "value": "6" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["record"]["updated_by"], "admin-001");

    call(&state, "POST", "/api/auth/logout", None).await;
    assert_eq!(login(&state, "rita@capymes.com", "rita123").await, StatusCode::OK);
}

#[tokio::test]
async fn forcing_offline_records_reason() {
    let (_dir, state) = offline_state();
    login(&state, "pedro@capymes.com", "123456").await;

    let (_, status) = call(&state, "POST", "/api/connection/offline", None).await;
    assert_eq!(status["is_online"], false);
    assert_eq!(status["mode"], "manual");
    assert_eq!(status["last_error"], "offline mode forced by user");

    let (_, status) = call(&state, "POST", "/api/connection/connect", None).await;
    assert_eq!(status["is_online"], false);
    assert!(status["last_error"].is_string());
}

#[tokio::test]
async fn admin_writes_join_the_admin_user() {
    let (_dir, state) = offline_state();
    assert_eq!(login(&state, "admin", "admin").await, StatusCode::OK);

    let draft = json!({ "product_name": "Produto Epsilon", "quantity": 25 });
    let (_, saved) = call(&state, "POST", "/api/orders", Some(draft)).await;
    let order_id = saved["record"]["id"].as_str().unwrap().to_string();

    let draft = json!({ "type": "corrective", "description": "Troca de correia" });
    let (_, saved) = call(&state, "POST", "/api/maintenance", Some(draft)).await;
    let maintenance_id = saved["record"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&state, "POST", "/api/alerts/alert-001/resolve", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, orders) = call(&state, "GET", "/api/orders", None).await;
    let order = orders.as_array().unwrap().iter().find(|o| o["id"] == order_id.as_str()).unwrap();
    assert_eq!(order["created_by_user"]["id"], "admin-001");

    let (_, maintenance) = call(&state, "GET", "/api/maintenance", None).await;
    let entry = maintenance.as_array().unwrap().iter().find(|m| m["id"] == maintenance_id.as_str()).unwrap();
    assert_eq!(entry["created_by_user"]["name"], "Administrador");

    let (_, alerts) = call(&state, "GET", "/api/alerts", None).await;
    let alert = alerts.as_array().unwrap().iter().find(|a| a["id"] == "alert-001").unwrap();
    assert_eq!(alert["resolved_by"], "admin-001");
    assert_eq!(alert["resolved_by_user"]["id"], "admin-001");
}

#[tokio::test]
async fn admin_account_only_signs_in_with_fixed_credential() {
    let (_dir, state) = offline_state();
    assert_eq!(login(&state, "admin@capymes.com", "123456").await, StatusCode::UNAUTHORIZED);

    login(&state, "admin", "admin").await;
    let profile = json!({ "name": "Admin Renamed", "email": "admin@capymes.com" });
    let (status, _) = call(&state, "PUT", "/api/profile", Some(profile)).await;
    assert_eq!(status, StatusCode::OK);

    let change = json!({ "current_password": "admin", "new_password": "abcdef", "confirm_password": "abcdef" });
    let (status, _) = call(&state, "PUT", "/api/profile/password", Some(change)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    call(&state, "POST", "/api/auth/logout", None).await;
    assert_eq!(login(&state, "admin@capymes.com", "123456").await, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&state, "admin", "admin").await, StatusCode::OK);
}
