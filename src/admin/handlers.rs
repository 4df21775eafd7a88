use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::repo;
use crate::{
    auth::{dto::PublicUser, extractors::AdminUser},
    state::AppState,
    trips::repo_types::{Rating, Report, Trip},
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/reports", get(list_reports))
        .route("/admin/reports/:id/resolve", post(resolve_report))
        .route("/admin/ratings", get(list_ratings))
        .route("/admin/trips", get(list_trips))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", patch(update_user))
}

#[derive(Debug, Deserialize)]
pub struct ReportFilter {
    pub resolved: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct RatingFilter {
    pub driver_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub is_admin: bool,
}

fn default_limit() -> i64 {
    50
}

fn page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, 200), offset.max(0))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = ?e, "admin query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

/// An administrator may not revoke their own role, so the last admin cannot
/// lock everyone out.
fn check_role_change(
    admin_id: Uuid,
    target_id: Uuid,
    is_admin: bool,
) -> Result<(), (StatusCode, String)> {
    if admin_id == target_id && !is_admin {
        return Err((
            StatusCode::BAD_REQUEST,
            "Administrators cannot revoke their own role".into(),
        ));
    }
    Ok(())
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_reports(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<Report>>, (StatusCode, String)> {
    let (limit, offset) = page(filter.limit, filter.offset);
    let rows = repo::list_reports(&state.db, filter.resolved, limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn resolve_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Report>, (StatusCode, String)> {
    let report = repo::resolve_report(&state.db, report_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Report not found".to_string()))?;

    info!(%report_id, "report resolved");
    Ok(Json(report))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_ratings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(filter): Query<RatingFilter>,
) -> Result<Json<Vec<Rating>>, (StatusCode, String)> {
    let (limit, offset) = page(filter.limit, filter.offset);
    let rows = repo::list_ratings(&state.db, filter.driver_id, limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_trips(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Trip>>, (StatusCode, String)> {
    let (limit, offset) = page(q.limit, q.offset);
    let rows = repo::list_trips(&state.db, limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<PublicUser>>, (StatusCode, String)> {
    let (limit, offset) = page(q.limit, q.offset);
    let rows = repo::list_users(&state.db, limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(rows.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    if let Err(rejection) = check_role_change(admin.id, user_id, body.is_admin) {
        warn!(%user_id, "self demotion rejected");
        return Err(rejection);
    }

    let user = repo::set_admin(&state.db, user_id, body.is_admin)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    info!(%user_id, is_admin = user.is_admin, "user role updated");
    Ok(Json(PublicUser::from(user)))
}
