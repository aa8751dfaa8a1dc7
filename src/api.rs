// 🌐 REST API with Axum
//
// All /api routes except health, register, login and categories need an
// `Authorization: Bearer <token>` header obtained from /api/login.

use crate::auth;
use crate::db;
use crate::entities::{Category, Credentials, Expense, ExpenseInput, ExpenseQuery, ExpenseSummary, NewUser, User};
use crate::error::TrackerError;
use crate::export;
use crate::rules::{self, ClassificationResult};
use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(conn: Connection, session_ttl: chrono::Duration) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            session_ttl,
        }
    }

    /// A panic while holding the lock leaves SQLite itself consistent,
    /// so a poisoned mutex is still usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Errors -> HTTP
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = match &self {
            TrackerError::Validation(_) => StatusCode::BAD_REQUEST,
            TrackerError::NotFound { .. } => StatusCode::NOT_FOUND,
            TrackerError::Conflict(_) => StatusCode::CONFLICT,
            TrackerError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = if self.is_client_error() {
            self.to_string()
        } else {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        };

        let mut response = (status, Json(ErrorBody { detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

// Unparseable JSON bodies get the same `{"detail"}` shape as other 400s
impl From<JsonRejection> for TrackerError {
    fn from(rejection: JsonRejection) -> Self {
        TrackerError::Validation(rejection.body_text())
    }
}

/// Run CPU-heavy work (password hashing) off the async workers
async fn blocking<T, F>(work: F) -> Result<T, TrackerError>
where
    F: FnOnce() -> Result<T, TrackerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TrackerError::PasswordHash(format!("hashing task failed: {}", e)))?
}

// ============================================================================
// Authenticated caller
// ============================================================================

/// The user behind the request's bearer token
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = TrackerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(auth::bearer_token)
            .ok_or(TrackerError::Unauthorized)?
            .to_string();

        let user = auth::authenticate(&state.conn(), &token)?;
        Ok(CurrentUser { user, token })
    }
}

// ============================================================================
// Request / response shapes
// ============================================================================

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    token_type: &'static str,
    expires_at: DateTime<Utc>,
    user: User,
}

/// Body of POST /api/ai/category. Each field is read on its own: a field
/// that is missing or not a string is treated as absent.
#[derive(Debug, Default)]
pub struct CategoryRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl CategoryRequest {
    pub fn from_body(body: &[u8]) -> Self {
        let value: Value = serde_json::from_slice(body).unwrap_or_default();
        let text = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_owned);

        CategoryRequest {
            title: text("title"),
            description: text("description"),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/categories - Fixed category labels in priority order
async fn list_categories() -> Json<Vec<&'static str>> {
    Json(Category::ALL.iter().map(|c| c.as_str()).collect())
}

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), TrackerError> {
    let Json(new_user) = payload?;
    new_user.validate()?;

    let password = new_user.password.clone();
    let password_hash = blocking(move || auth::hash_password(&password)).await?;

    let user = auth::create_user(&state.conn(), &new_user, &password_hash)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, TrackerError> {
    let Json(credentials) = payload?;

    // Lock released before the slow hash check
    let found = db::find_user_credentials(&state.conn(), credentials.username.trim())?;
    let (user, phc) = found.ok_or(TrackerError::Unauthorized)?;

    let password = credentials.password;
    let valid = blocking(move || Ok(auth::verify_password(&password, &phc))).await?;
    if !valid {
        debug!(username = %credentials.username, "login rejected");
        return Err(TrackerError::Unauthorized);
    }

    let session = auth::open_session(&state.conn(), user, state.session_ttl)?;

    Ok(Json(LoginResponse {
        access_token: session.token,
        token_type: "bearer",
        expires_at: session.expires_at,
        user: session.user,
    }))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, current: CurrentUser) -> Result<StatusCode, TrackerError> {
    auth::logout(&state.conn(), &current.token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/me
async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// POST /api/expenses
async fn create_expense(
    State(state): State<AppState>,
    current: CurrentUser,
    payload: Result<Json<ExpenseInput>, JsonRejection>,
) -> Result<Json<Expense>, TrackerError> {
    let Json(payload) = payload?;
    let expense = db::create_expense(&state.conn(), current.user.id, &payload)?;
    Ok(Json(expense))
}

/// GET /api/expenses?month=YYYY-MM&weekday=0..6&search=..&sort=..
async fn list_expenses(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<Vec<Expense>>, TrackerError> {
    let expenses = db::list_expenses(&state.conn(), current.user.id, &query)?;
    Ok(Json(expenses))
}

/// GET /api/expenses/summary
async fn expense_summary(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<ExpenseSummary>, TrackerError> {
    let summary = db::expense_summary(&state.conn(), current.user.id)?;
    Ok(Json(summary))
}

/// GET /api/expenses/export.csv - same filters as the list endpoint
async fn export_expenses(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ExpenseQuery>,
) -> Result<Response, TrackerError> {
    let expenses = db::list_expenses(&state.conn(), current.user.id, &query)?;
    let body = export::to_csv_string(&expenses)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::export_filename(Utc::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// GET /api/expenses/:id
async fn get_expense(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Expense>, TrackerError> {
    let expense = db::get_expense(&state.conn(), current.user.id, id)?;
    Ok(Json(expense))
}

/// PUT /api/expenses/:id
async fn update_expense(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    payload: Result<Json<ExpenseInput>, JsonRejection>,
) -> Result<Json<Expense>, TrackerError> {
    let Json(payload) = payload?;
    let expense = db::update_expense(&state.conn(), current.user.id, id, &payload)?;
    Ok(Json(expense))
}

/// DELETE /api/expenses/:id
async fn delete_expense(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, TrackerError> {
    db::delete_expense(&state.conn(), current.user.id, id)?;
    Ok(Json(serde_json::json!({ "msg": "deleted" })))
}

/// POST /api/ai/category - Suggest a category. Always 200 for an
/// authenticated caller, whatever the body looks like or how large it is.
async fn predict_category(_current: CurrentUser, body: Bytes) -> Json<ClassificationResult> {
    let request = CategoryRequest::from_body(&body);
    Json(rules::classify(
        request.title.as_deref().unwrap_or(""),
        request.description.as_deref(),
    ))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState, static_dir: &FsPath) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/categories", get(list_categories))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/summary", get(expense_summary))
        .route("/expenses/export.csv", get(export_expenses))
        .route(
            "/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route(
            "/ai/category",
            post(predict_category).layer(DefaultBodyLimit::disable()),
        )
        .with_state(state);

    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("login.html")))
        .route_service("/register-page", ServeFile::new(static_dir.join("register.html")))
        .route_service("/dashboard", ServeFile::new(static_dir.join("dashboard.html")))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
