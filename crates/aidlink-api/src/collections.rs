//! HTTP surface over the file store: one GET/POST pair per collection.
//! GET returns the whole collection (seeded default when missing);
//! POST replaces it with the body's array. The admin log POST is the
//! exception — it takes a single record and prepends it server-side.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tracing::error;

use aidlink_store::FileStore;
use aidlink_types::Collection;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: FileStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/users", get(get_users).post(replace_users))
        .route("/api/requests", get(get_requests).post(replace_requests))
        .route("/api/admin/logs", get(get_admin_logs).post(append_admin_log))
        .with_state(state)
}

async fn get_users(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.store.read(Collection::Users).await)
}

async fn get_requests(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.store.read(Collection::Requests).await)
}

async fn get_admin_logs(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.store.read(Collection::AdminLogs).await)
}

async fn replace_users(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    replace_collection(&state, Collection::Users, body).await
}

async fn replace_requests(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    replace_collection(&state, Collection::Requests, body).await
}

async fn replace_collection(state: &AppState, collection: Collection, body: Value) -> Response {
    let Value::Array(records) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "expected a JSON array" })),
        )
            .into_response();
    };

    match state.store.replace(collection, &records).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            error!("Error writing {}: {}", collection, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to save {}", collection) })),
            )
                .into_response()
        }
    }
}

async fn append_admin_log(State(state): State<AppState>, Json(record): Json<Value>) -> Response {
    match state.store.append_log(record).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            error!("Error writing admin logs: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to save log" })),
            )
                .into_response()
        }
    }
}
