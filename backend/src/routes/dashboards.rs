//! Dashboard routes
//!
//! Everything except the two share checks requires a token, and every
//! protected handler is scoped to the caller's id.

use super::{ApiJson, ApiQuery};
use crate::auth::{require_token, MaybeDecoded, Owner};
use crate::error::ApiResult;
use crate::services::DashboardService;
use crate::state::AppState;
use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use dashboard_shared::{
    CloneDashboardRequest, CreateDashboardRequest, DashboardIdRequest, DashboardListResponse,
    DashboardPasswordRequest, DashboardQuery, DashboardResponse, PasswordCheckResponse,
    SaveDashboardRequest, ShareCheckResponse, ShareDashboardRequest, ShareDashboardResponse,
    SuccessResponse,
};

/// Create dashboard routes
pub fn dashboard_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboards", get(list))
        .route("/create-dashboard", post(create))
        .route("/delete-dashboard", post(delete))
        .route("/dashboard", get(get_dashboard))
        .route("/save-dashboard", post(save))
        .route("/clone-dashboard", post(clone_dashboard))
        .route("/share-dashboard", post(share))
        .route("/change-password", post(change_password))
        .route_layer(middleware::from_fn_with_state(state, require_token))
        .route("/check-password-needed", post(check_password_needed))
        .route("/check-password", post(check_password))
}

async fn list(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Json<DashboardListResponse>> {
    Ok(Json(DashboardService::list(&state, owner).await?))
}

async fn create(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<CreateDashboardRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(DashboardService::create(&state, owner, req).await?))
}

async fn delete(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<DashboardIdRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(DashboardService::delete(&state, owner, req).await?))
}

/// GET /dashboards/dashboard?id=
async fn get_dashboard(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> ApiResult<Json<DashboardResponse>> {
    Ok(Json(DashboardService::get(&state, owner, query).await?))
}

async fn save(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<SaveDashboardRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(DashboardService::save(&state, owner, req).await?))
}

async fn clone_dashboard(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<CloneDashboardRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(DashboardService::clone(&state, owner, req).await?))
}

async fn share(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<ShareDashboardRequest>,
) -> ApiResult<Json<ShareDashboardResponse>> {
    Ok(Json(DashboardService::share(&state, owner, req).await?))
}

async fn change_password(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<DashboardPasswordRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(DashboardService::change_password(&state, owner, req).await?))
}

/// POST /dashboards/check-password-needed
///
/// A valid token, if present, identifies the owner; it is never required.
async fn check_password_needed(
    State(state): State<AppState>,
    MaybeDecoded(caller): MaybeDecoded,
    ApiJson(req): ApiJson<ShareDashboardRequest>,
) -> ApiResult<Json<ShareCheckResponse>> {
    let response = DashboardService::check_password_needed(&state, caller.as_ref(), req).await?;
    Ok(Json(response))
}

/// POST /dashboards/check-password
async fn check_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DashboardPasswordRequest>,
) -> ApiResult<Json<PasswordCheckResponse>> {
    Ok(Json(DashboardService::check_password(&state, req).await?))
}
