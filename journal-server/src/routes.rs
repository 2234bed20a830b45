//! Route definitions for the journal API.
//!
//! Public: service info, health, signup and login. Everything under
//! `/api/users` and `/api/journals` requires a bearer token.

use crate::auth::{auth_middleware, AuthState, AuthUser};
use crate::entry::{EntryFilter, JournalEntry, SqliteEntryStore, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::lifecycle::{EntryLifecycle, EntryUpdate};
use crate::user::{SignupRequest, User, UserStore};
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use journal_analysis::MoodAnalyzer;
use journal_common::config::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Longest accepted entry title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
    pub users: Arc<UserStore>,
    pub lifecycle: EntryLifecycle,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Signup and login response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
}

/// User response (sanitized user data).
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Body for creating an entry.
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub title: String,
    pub content: String,
}

/// Body for updating an entry. Omitted fields stay as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub min_mood_score: Option<f64>,
    #[serde(default)]
    pub max_mood_score: Option<f64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl ListEntriesQuery {
    fn into_filter(self) -> ApiResult<EntryFilter> {
        let limit = self.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit > MAX_LIST_LIMIT {
            return Err(bad_request(format!("limit must not exceed {}", MAX_LIST_LIMIT)));
        }

        Ok(EntryFilter {
            mood: self.mood,
            min_mood_score: self.min_mood_score,
            max_mood_score: self.max_mood_score,
            limit,
            offset: self.offset.unwrap_or(0),
        })
    }
}

/// Plain message response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Service info response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub analysis_available: bool,
}

/// Build every route, opening the stores at the configured database path.
pub fn build_all_routes(config: &Config, analyzer: Arc<MoodAnalyzer>) -> anyhow::Result<Router> {
    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let auth_state = AuthState::new(config.auth.secret(), config.auth.token_expiry_secs);
    let users = Arc::new(UserStore::new(&db_path)?);
    let entries = Arc::new(SqliteEntryStore::new(&db_path)?);
    let analysis_available = analyzer.is_available();

    let app_state = AppState {
        auth: auth_state.clone(),
        users,
        lifecycle: EntryLifecycle::new(entries, analyzer),
    };

    let protected = Router::new()
        .route("/api/users/me", get(me_handler))
        .route("/api/users/:id", get(get_user_handler))
        .route(
            "/api/journals",
            get(list_entries_handler).post(create_entry_handler),
        )
        .route(
            "/api/journals/:id",
            get(get_entry_handler)
                .put(update_entry_handler)
                .delete(delete_entry_handler),
        )
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    let app_routes = Router::new()
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .merge(protected)
        .with_state(app_state);

    Ok(Router::new()
        .merge(app_routes)
        .merge(health_routes(analysis_available)))
}

/// Service info and health routes.
pub fn health_routes(analysis_available: bool) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route(
            "/health",
            get(move || health_handler(analysis_available)),
        )
}

// ─────────────────────────────────────────────────────────────────────────────
// Error helpers
// ─────────────────────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn bad_request(error: impl Into<String>) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, error, "INVALID_INPUT")
}

fn entry_not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Journal entry not found", "ENTRY_NOT_FOUND")
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %e, "{}", context);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, context, "INTERNAL_ERROR")
}

fn from_common_error(e: journal_common::Error) -> ApiError {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = e.code();
    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
        return error_response(status, "Internal server error", code);
    }
    let message = match e {
        journal_common::Error::InvalidInput(msg) => msg,
        other => other.to_string(),
    };
    error_response(status, message, code)
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Register and log in.
async fn signup_handler(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let user = state.users.signup(&request).map_err(from_common_error)?;
    let response = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid_credentials = || {
        error_response(
            StatusCode::UNAUTHORIZED,
            "Incorrect email or password",
            "AUTH_INVALID_CREDENTIALS",
        )
    };

    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(invalid_credentials());
    }

    let user = state
        .users
        .verify_password(&request.email, &request.password)
        .map_err(from_common_error)?
        .ok_or_else(invalid_credentials)?;

    if !user.is_active {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Inactive user",
            "AUTH_INACTIVE_USER",
        ));
    }

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(issue_token(&state, user)?))
}

fn issue_token(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_token = state
        .auth
        .generate_token(&user.id)
        .map_err(|e| internal_error("Failed to generate token", e))?;

    Ok(AuthResponse {
        user: user.into(),
        access_token,
        token_type: "bearer".into(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// User Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn me_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    find_user(&state, &auth_user.user_id).map(Json)
}

async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    find_user(&state, &id).map(Json)
}

fn find_user(state: &AppState, id: &str) -> ApiResult<UserResponse> {
    state
        .users
        .get(id)
        .map_err(from_common_error)?
        .map(UserResponse::from)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "User not found", "USER_NOT_FOUND"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Journal Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn validate_title(title: &str) -> ApiResult<()> {
    if title.trim().is_empty() {
        return Err(bad_request("Title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(bad_request(format!(
            "Title too long (max {} characters)",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

async fn create_entry_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<CreateEntryRequest>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    validate_title(&request.title)?;

    let entry = state
        .lifecycle
        .create_entry(&auth_user.user_id, &request.title, &request.content)
        .await
        .map_err(|e| internal_error("Failed to create journal entry", e))?;

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_entries_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListEntriesQuery>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    let filter = query.into_filter()?;

    let entries = state
        .lifecycle
        .store()
        .list_entries(&auth_user.user_id, &filter)
        .await
        .map_err(|e| internal_error("Failed to fetch journal entries", e))?;

    Ok(Json(entries))
}

async fn get_entry_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<JournalEntry>> {
    state
        .lifecycle
        .store()
        .get_entry(&id, &auth_user.user_id)
        .await
        .map_err(|e| internal_error("Failed to fetch journal entry", e))?
        .map(Json)
        .ok_or_else(entry_not_found)
}

async fn update_entry_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEntryRequest>,
) -> ApiResult<Json<JournalEntry>> {
    if let Some(title) = &request.title {
        validate_title(title)?;
    }

    let update = EntryUpdate {
        title: request.title,
        content: request.content,
    };

    state
        .lifecycle
        .update_entry(&id, &auth_user.user_id, update)
        .await
        .map_err(|e| internal_error("Failed to update journal entry", e))?
        .map(Json)
        .ok_or_else(entry_not_found)
}

async fn delete_entry_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state
        .lifecycle
        .delete_entry(&id, &auth_user.user_id)
        .await
        .map_err(|e| internal_error("Failed to delete journal entry", e))?;

    if !deleted {
        return Err(entry_not_found());
    }

    Ok(Json(MessageResponse {
        message: "Journal entry deleted successfully".into(),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Info Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Journal App API".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

async fn health_handler(analysis_available: bool) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: "journal-server".into(),
        analysis_available,
    })
}
