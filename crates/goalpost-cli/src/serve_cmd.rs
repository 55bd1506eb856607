use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use goalpost_core::UserId;
use goalpost_core::entitlement::{self, PremiumStatus};
use goalpost_core::goal::{self, GoalError, GoalInput};
use goalpost_core::leaderboard::{self, LeaderboardError};
use goalpost_core::plan::{
    DescriptorError, MaterializeError, PlanRequest, PlanSourceError, PlanSources, TaskDescriptor,
    descriptors_from_value, materialize,
};
use goalpost_core::task::{self, TaskError};
use goalpost_core::token::{TokenConfig, validate_session_token};
use goalpost_core::verify::{self, VerificationMethod, VerifyError};
use goalpost_db::models::{Goal, GoalType, ProgressEntry, Task, VerificationMode};
use goalpost_db::queries::goals as goal_db;
use goalpost_db::queries::profiles::LeaderboardEntry;
use goalpost_db::queries::tasks::TaskWithGoal;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub token_config: TokenConfig,
    pub plan_sources: PlanSources,
}

impl AppState {
    pub fn new(pool: PgPool, token_config: TokenConfig, plan_sources: PlanSources) -> Self {
        Self {
            pool,
            token_config,
            plan_sources,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not authenticated")
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PlanSourceError> for AppError {
    fn from(err: PlanSourceError) -> Self {
        let status = match &err {
            PlanSourceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PlanSourceError::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            PlanSourceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            PlanSourceError::Unavailable { .. }
            | PlanSourceError::Transport(_)
            | PlanSourceError::InvalidPlanFormat(_) => StatusCode::BAD_GATEWAY,
            PlanSourceError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.to_string())
    }
}

impl From<DescriptorError> for AppError {
    fn from(err: DescriptorError) -> Self {
        Self::bad_request(format!("invalid tasks: {err}"))
    }
}

impl From<MaterializeError> for AppError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::GoalNotFound(_) => Self::not_found(err.to_string()),
            MaterializeError::DescriptorOutOfRange { .. } => Self::bad_request(err.to_string()),
            MaterializeError::Store(e) => Self::internal(e),
        }
    }
}

impl From<GoalError> for AppError {
    fn from(err: GoalError) -> Self {
        match err {
            GoalError::Validation(msg) => Self::bad_request(msg),
            GoalError::NotFound(_) => Self::not_found(err.to_string()),
            GoalError::TasksExist { .. } => Self::conflict(err.to_string()),
            GoalError::Plan(e) => e.into(),
            GoalError::Materialize(e) => e.into(),
            GoalError::Store(e) => Self::internal(e),
        }
    }
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(_) => Self::not_found(err.to_string()),
            TaskError::AlreadyVerified => Self::conflict(err.to_string()),
            TaskError::Store(e) => Self::internal(e),
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::TaskNotFound(_) => Self::not_found(err.to_string()),
            VerifyError::NotCompleted | VerifyError::CameraRequired => {
                Self::bad_request(err.to_string())
            }
            VerifyError::AlreadyVerified => Self::conflict(err.to_string()),
            VerifyError::Store(e) => Self::internal(e),
        }
    }
}

impl From<LeaderboardError> for AppError {
    fn from(err: LeaderboardError) -> Self {
        match err {
            LeaderboardError::PremiumRequired => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            LeaderboardError::Store(e) => Self::internal(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity extractors
// ---------------------------------------------------------------------------

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Caller identity from a `Bearer` session token. Rejects with 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(AppError::unauthenticated)?;
        let user = validate_session_token(&state.token_config, token).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            AppError::unauthenticated()
        })?;
        Ok(Self(user))
    }
}

/// Caller identity when present and valid; `None` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<UserId>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts)
            .and_then(|token| validate_session_token(&state.token_config, token).ok());
        Ok(Self(user))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlanRequest {
    pub goal_type: GoalType,
    pub duration: i64,
    pub intensity: i64,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratePlanResponse {
    pub tasks: Vec<TaskDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTasksRequest {
    pub goal_id: Uuid,
    pub tasks: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTasksResponse {
    pub success: bool,
    pub tasks_created: usize,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub goal_type: GoalType,
    #[serde(default = "default_verification_mode")]
    pub verification_mode: VerificationMode,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_days: Option<i32>,
    #[serde(default = "default_intensity")]
    pub intensity: i32,
    #[serde(default)]
    pub use_ai: bool,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

fn default_verification_mode() -> VerificationMode {
    VerificationMode::Normal
}

fn default_intensity() -> i32 {
    3
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalResponse {
    pub goal: Goal,
    pub tasks_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GoalDetailResponse {
    #[serde(flatten)]
    pub goal: Goal,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    #[serde(default)]
    pub use_ai: bool,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Normal,
    #[serde(alias = "strict")]
    Camera,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub method: MethodKind,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/functions/generate-goal-plan", post(generate_goal_plan))
        .route("/functions/create-tasks", post(create_tasks))
        .route("/functions/check-premium-status", post(check_premium_status))
        .route("/api/goals", get(list_goals).post(create_goal))
        .route("/api/goals/{id}", get(get_goal))
        .route("/api/goals/{id}/tasks/regenerate", post(regenerate_tasks))
        .route("/api/tasks/today", get(tasks_today))
        .route("/api/tasks/{id}/complete", post(complete_task))
        .route("/api/tasks/{id}/verify", post(verify_task))
        .route("/api/leaderboard", get(get_leaderboard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    if !state.plan_sources.ai_configured() {
        tracing::warn!("no AI api key configured; AI planning requests will fail");
    }
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("goalpost serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("goalpost serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|e| AppError::internal(e.into()))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn generate_goal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<GeneratePlanRequest>, JsonRejection>,
) -> Result<Json<GeneratePlanResponse>, AppError> {
    let Json(req) = payload?;

    let duration_days = u32::try_from(req.duration)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| AppError::bad_request("duration must be a positive number of days"))?;
    let intensity = u8::try_from(req.intensity)
        .ok()
        .filter(|i| (1..=5).contains(i))
        .ok_or_else(|| AppError::bad_request("intensity must be between 1 and 5"))?;

    let source = state.plan_sources.select(true)?;
    let request = PlanRequest {
        goal_type: req.goal_type,
        title: req.title,
        description: req.description,
        duration_days,
        intensity,
        custom_prompt: req.custom_prompt,
    };
    let tasks = source.generate(&request).await?;
    tracing::info!(user_id = %user, tasks = tasks.len(), "plan generated");
    Ok(Json(GeneratePlanResponse { tasks }))
}

async fn create_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateTasksRequest>, JsonRejection>,
) -> Result<Json<CreateTasksResponse>, AppError> {
    let Json(req) = payload?;
    let descriptors = descriptors_from_value(&req.tasks)?;
    let tasks = materialize(&state.pool, user, req.goal_id, &descriptors).await?;
    Ok(Json(CreateTasksResponse {
        success: true,
        tasks_created: tasks.len(),
        tasks,
    }))
}

async fn check_premium_status(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> Json<PremiumStatus> {
    Json(entitlement::premium_status(&state.pool, user, Utc::now()).await)
}

async fn list_goals(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Goal>>, AppError> {
    let goals = goal_db::list_goals_for_user(&state.pool, user.as_uuid())
        .await
        .map_err(AppError::internal)?;
    Ok(Json(goals))
}

async fn create_goal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateGoalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateGoalResponse>), AppError> {
    let Json(req) = payload?;
    let input = GoalInput {
        title: req.title,
        description: req.description,
        goal_type: req.goal_type,
        verification_mode: req.verification_mode,
        start_date: req.start_date,
        end_date: req.end_date,
        duration_days: req.duration_days,
        intensity: req.intensity,
        use_ai: req.use_ai,
        custom_prompt: req.custom_prompt,
    };
    let created = goal::create_goal(&state.pool, &state.plan_sources, user, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateGoalResponse {
            goal: created.goal,
            tasks_created: created.tasks_created,
            task_error: created.task_error.map(|e| e.to_string()),
        }),
    ))
}

async fn get_goal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GoalDetailResponse>, AppError> {
    let (goal, tasks) = goal::get_goal_with_tasks(&state.pool, user, id).await?;
    Ok(Json(GoalDetailResponse { goal, tasks }))
}

async fn regenerate_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<RegenerateRequest>, JsonRejection>,
) -> Result<Json<CreateTasksResponse>, AppError> {
    let Json(req) = payload?;
    let tasks = goal::regenerate_tasks(
        &state.pool,
        &state.plan_sources,
        user,
        id,
        req.use_ai,
        req.custom_prompt.as_deref(),
    )
    .await?;
    Ok(Json(CreateTasksResponse {
        success: true,
        tasks_created: tasks.len(),
        tasks,
    }))
}

async fn tasks_today(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<TaskWithGoal>>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(task::list_tasks_for_day(&state.pool, user, date).await?))
}

async fn complete_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let Json(req) = payload?;
    Ok(Json(
        task::set_task_completion(&state.pool, user, id, req.completed).await?,
    ))
}

async fn verify_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<ProgressEntry>, AppError> {
    let Json(req) = payload?;
    let method = match req.method {
        MethodKind::Normal => VerificationMethod::Normal,
        MethodKind::Camera => VerificationMethod::Camera {
            captured_at: req
                .captured_at
                .ok_or_else(|| AppError::bad_request("camera verification requires capturedAt"))?,
        },
    };
    Ok(Json(verify::verify(&state.pool, user, id, method).await?))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(
        leaderboard::leaderboard(&state.pool, user, query.limit).await?,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
