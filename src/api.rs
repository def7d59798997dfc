// REST API - account mappings behind the uniqueness guard
// Enabled with the `server` feature.

use crate::checker::CandidateRecord;
use crate::config::GuardConfig;
use crate::error::{GuardError, StoreError};
use crate::event::RecordEvent;
use crate::guard::{HandleError, MappingGuard, Verdict};
use crate::key::{CompositeKey, RecordId};
use crate::store::{SqliteStore, StoredRecord};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    config: Arc<GuardConfig>,
}

impl AppState {
    pub fn new(store: SqliteStore, config: GuardConfig) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(config),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SqliteStore>, Response> {
        self.store.lock().map_err(|_| {
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "store unavailable: lock poisoned".to_string(),
            )
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Serialize)]
struct CreatedResponse {
    id: RecordId,
}

#[derive(Serialize)]
struct VerdictResponse {
    verdict: Verdict,
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

fn guard_error_response(err: GuardError) -> Response {
    let status = match &err {
        GuardError::DuplicateRecord { .. } => StatusCode::CONFLICT,
        GuardError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        GuardError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status != StatusCode::CONFLICT {
        tracing::error!("request failed: {}", err);
    }
    error_response(status, err.to_string())
}

fn store_error_response(err: StoreError) -> Response {
    guard_error_response(GuardError::StoreUnavailable(err))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/mappings - All stored mappings
async fn list_mappings(State(state): State<AppState>) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.all() {
        Ok(records) => (
            StatusCode::OK,
            Json(ApiResponse::<Vec<StoredRecord>>::ok(records)),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /api/mappings - Create a mapping if its key is unique
async fn create_mapping(
    State(state): State<AppState>,
    Json(key): Json<CompositeKey>,
) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.create_checked(&state.config, key) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(CreatedResponse { id })),
        )
            .into_response(),
        Err(e) => guard_error_response(e),
    }
}

/// PUT /api/mappings/:id - Partial key update; absent fields keep stored values
async fn update_mapping(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(changes): Json<CompositeKey>,
) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.update_checked(&state.config, id, changes) {
        Ok(key) => (StatusCode::OK, Json(ApiResponse::ok(key))).into_response(),
        Err(e) => guard_error_response(e),
    }
}

/// POST /api/validate - Run a host event through the guard without writing
async fn validate_event(
    State(state): State<AppState>,
    Json(event): Json<RecordEvent>,
) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    let guard = MappingGuard::new(&*store, (*state.config).clone());
    match guard.handle(&event) {
        Ok(verdict) => (
            StatusCode::OK,
            Json(ApiResponse::ok(VerdictResponse { verdict })),
        )
            .into_response(),
        Err(HandleError::Event(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(HandleError::Guard(e)) => guard_error_response(e),
    }
}

/// POST /api/candidates/check - Check a typed candidate without writing
async fn check_candidate(
    State(state): State<AppState>,
    Json(candidate): Json<CandidateRecord>,
) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    let guard = MappingGuard::new(&*store, (*state.config).clone());
    match guard.check(&candidate) {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(VerdictResponse { verdict: Verdict::Accepted })),
        )
            .into_response(),
        Err(e) => guard_error_response(e),
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/mappings", get(list_mappings).post(create_mapping))
        .route("/mappings/:id", put(update_mapping))
        .route("/validate", post(validate_event))
        .route("/candidates/check", post(check_candidate))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::EntityRef;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let store = SqliteStore::open_in_memory().unwrap();
        router(AppState::new(store, GuardConfig::default()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let app = app();
        let key = json!({
            "source_property": EntityRef::new().to_string(),
            "source_system": EntityRef::new().to_string(),
            "source_legal_entity": EntityRef::new().to_string(),
            "source_account_number": "123"
        });

        let (status, _) = send(&app, "POST", "/api/mappings", key.clone()).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, "POST", "/api/mappings", key).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!(crate::DUPLICATE_RECORD_MESSAGE));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let app = app();
        let property = EntityRef::new().to_string();
        let (_, created) = send(
            &app,
            "POST",
            "/api/mappings",
            json!({"source_property": property, "source_account_number": "123"}),
        )
        .await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/mappings/{}", id),
            json!({"source_account_number": "456"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source_property"], json!(property));
        assert_eq!(body["data"]["source_account_number"], json!("456"));
    }

    #[tokio::test]
    async fn test_update_unknown_record() {
        let app = app();
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/mappings/{}", RecordId::new()),
            json!({"source_account_number": "1"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validate_event() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/validate",
            json!({"message": "Create", "entity": "trax_accountmapping",
                   "attributes": {"trax_orignalname": "77"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verdict"], json!("Accepted"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/validate",
            json!({"message": "Delete", "entity": "trax_accountmapping"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
