// 🌐 REST API
//
// Every route lives under /api and answers with the same envelope:
// { "success": bool, "data"?: T, "message"?: string }

use crate::analysis::{self, DateRange, Thresholds};
use crate::auth::{LoginGrant, SessionStore};
use crate::config::AppConfig;
use crate::db::{self, DbStatus};
use crate::entities::{self, MemoFilter, MemoStats, MemoView};
use crate::error::LedgerError;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub db_path: PathBuf,
    pub sessions: SessionStore,
    pub thresholds: Thresholds,
    pub require_token: bool,
}

impl AppState {
    pub fn new(conn: Connection, db_path: PathBuf, config: &AppConfig) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            db_path,
            sessions: SessionStore::new(
                &config.auth.password,
                chrono::Duration::days(config.auth.token_ttl_days),
            ),
            thresholds: config.analysis,
            require_token: config.auth.require_token,
        }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Connection) -> crate::Result<T>) -> crate::Result<T> {
        let conn = self.db.lock().map_err(|_| LedgerError::LockPoisoned)?;
        f(&conn)
    }
}

// ============================================================================
// Envelope & errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// `LedgerError` mapped onto HTTP statuses
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            LedgerError::Validation { message } => (StatusCode::BAD_REQUEST, message),
            LedgerError::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message),
            err @ LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            err => {
                error!("❌ Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl From<RangeQuery> for DateRange {
    fn from(query: RangeQuery) -> Self {
        DateRange::new(query.start_date, query.end_date)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdQuery {
    pub expense_threshold: Option<f64>,
    pub balance_threshold: Option<f64>,
    pub year_balance_threshold: Option<f64>,
}

impl ThresholdQuery {
    fn apply(&self, base: Thresholds) -> crate::Result<Thresholds> {
        let thresholds = Thresholds {
            expense_threshold: self.expense_threshold.unwrap_or(base.expense_threshold),
            balance_threshold: self.balance_threshold.unwrap_or(base.balance_threshold),
            year_balance_threshold: self
                .year_balance_threshold
                .unwrap_or(base.year_balance_threshold),
        };

        let all_finite = [
            thresholds.expense_threshold,
            thresholds.balance_threshold,
            thresholds.year_balance_threshold,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            return Err(LedgerError::validation("thresholds must be finite numbers"));
        }
        if thresholds.expense_threshold < 0.0 {
            return Err(LedgerError::validation("expenseThreshold must not be negative"));
        }
        Ok(thresholds)
    }
}

/// Memo list query; everything arrives as text
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl TryFrom<MemoQuery> for MemoFilter {
    type Error = LedgerError;

    fn try_from(query: MemoQuery) -> crate::Result<Self> {
        let priority = match query.priority.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                LedgerError::validation(format!("priority must be an integer, got '{raw}'"))
            })?),
        };

        Ok(MemoFilter {
            search: query.search,
            tag: query.tag,
            priority,
            start_date: query.start_date,
            end_date: query.end_date,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: Option<String>,
}

// Health and auth answer with flat bodies (`response.data.token` on the
// client side); failures still go through the envelope.

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
    pub database: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub grant: LoginGrant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub success: bool,
    pub message: &'static str,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStatusResponse {
    pub database: &'static str,
    pub db_path: String,
    #[serde(flatten)]
    pub status: DbStatus,
}

fn check_year(year: i32) -> crate::Result<i32> {
    if (1..=9999).contains(&year) {
        Ok(year)
    } else {
        Err(LedgerError::validation(format!("year out of range: {year}")))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK",
        message: "Server is running",
        database: "SQLite",
    })
}

/// GET /api/debug/db-status
async fn db_status(State(state): State<AppState>) -> ApiResult<DbStatusResponse> {
    info!("GET /api/debug/db-status");
    let status = state.with_db(db::db_status)?;

    Ok(Json(ApiResponse::ok(DbStatusResponse {
        database: "SQLite",
        db_path: state.db_path.display().to_string(),
        status,
    })))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    info!("POST /api/auth/login");
    let grant = state.sessions.login(body.password.as_deref().unwrap_or_default())?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful",
        grant,
    }))
}

/// POST /api/auth/verify
async fn verify(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<TokenStatus>, ApiError> {
    let expires_at = state.sessions.verify(body.token.as_deref().unwrap_or_default())?;
    Ok(Json(TokenStatus {
        success: true,
        message: "Token is valid",
        expires_at,
    }))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<Acknowledgement>, ApiError> {
    info!("POST /api/auth/logout");
    state.sessions.logout(body.token.as_deref())?;
    Ok(Json(Acknowledgement {
        success: true,
        message: "Logged out",
    }))
}

/// GET /api/transactions/stats
async fn transaction_stats(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<analysis::Summary> {
    info!("GET /api/transactions/stats - query: {:?}", query);
    let range = DateRange::from(query);
    let stats = state.with_db(|conn| analysis::summary(conn, &range))?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/transactions/analysis
async fn transaction_analysis(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<analysis::AnalysisData> {
    info!("GET /api/transactions/analysis - query: {:?}", query);
    let range = DateRange::from(query);
    let data = state.with_db(|conn| analysis::analysis_data(conn, &range))?;
    Ok(Json(ApiResponse::ok(data)))
}

/// GET /api/analysis/:year
async fn financial_report(
    State(state): State<AppState>,
    Path(year): Path<i32>,
    Query(query): Query<ThresholdQuery>,
) -> ApiResult<analysis::FinancialReport> {
    info!("GET /api/analysis/{} - query: {:?}", year, query);
    let year = check_year(year)?;
    let thresholds = query.apply(state.thresholds)?;
    let report = state.with_db(|conn| analysis::financial_report(conn, year, &thresholds))?;
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/ledger/:year
async fn ledger_table(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<analysis::LedgerTable> {
    info!("GET /api/ledger/{}", year);
    let year = check_year(year)?;
    let table = state.with_db(|conn| analysis::ledger_table(conn, year))?;
    Ok(Json(ApiResponse::ok(table)))
}

/// GET /api/memos
async fn list_memos(
    State(state): State<AppState>,
    Query(query): Query<MemoQuery>,
) -> ApiResult<Vec<MemoView>> {
    info!("GET /api/memos - query: {:?}", query);
    let filter = MemoFilter::try_from(query)?;

    let views = state.with_db(|conn| {
        let memos = entities::list_memos(conn, &filter)?;
        let palette = entities::tag_colors(conn)?;
        Ok(memos
            .into_iter()
            .map(|memo| MemoView::build(memo, &palette))
            .collect::<Vec<_>>())
    })?;

    info!("✅ {} memos", views.len());
    Ok(Json(ApiResponse::ok(views)))
}

/// GET /api/memos/tags
async fn memo_tags(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let memos = state.with_db(|conn| entities::list_memos(conn, &MemoFilter::default()))?;
    Ok(Json(ApiResponse::ok(entities::distinct_tags(&memos))))
}

/// GET /api/memos/stats/summary
async fn memo_summary(State(state): State<AppState>) -> ApiResult<MemoStats> {
    let stats = state.with_db(entities::memo_stats)?;
    Ok(Json(ApiResponse::ok(stats)))
}

// ============================================================================
// Router
// ============================================================================

fn bearer_token(request: &Request) -> &str {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default()
}

/// Rejects requests without a live session when `require_token` is set
async fn require_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.require_token {
        return next.run(request).await;
    }

    let verdict = state.sessions.verify(bearer_token(&request));
    match verdict {
        Ok(_) => next.run(request).await,
        Err(LedgerError::Validation { .. }) => {
            ApiError(LedgerError::unauthorized("missing bearer token")).into_response()
        }
        Err(err) => ApiError(err).into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .route("/auth/logout", post(logout));

    let protected = Router::new()
        .route("/debug/db-status", get(db_status))
        .route("/transactions/stats", get(transaction_stats))
        .route("/transactions/analysis", get(transaction_analysis))
        .route("/analysis/:year", get(financial_report))
        .route("/ledger/:year", get(ledger_table))
        .route("/memos", get(list_memos))
        .route("/memos/tags", get(memo_tags))
        .route("/memos/stats/summary", get(memo_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api_routes = public.merge(protected).with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
