//! Source routes, all behind the authorization gate

use super::ApiJson;
use crate::auth::{require_token, Owner};
use crate::error::ApiResult;
use crate::services::SourceService;
use crate::state::AppState;
use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use dashboard_shared::{
    CheckSourcesRequest, CheckSourcesResponse, DashboardIdRequest, SourceListResponse,
    SourceRequest, SuccessResponse,
};

/// Create source routes
pub fn source_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/sources", get(list))
        .route("/create-source", post(create))
        .route("/change-source", post(change))
        .route("/delete-source", post(delete))
        .route("/check-sources", post(check_sources))
        .route_layer(middleware::from_fn_with_state(state, require_token))
}

async fn list(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Json<SourceListResponse>> {
    Ok(Json(SourceService::list(&state, owner).await?))
}

async fn create(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<SourceRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(SourceService::create(&state, owner, req).await?))
}

async fn change(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<SourceRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(SourceService::change(&state, owner, req).await?))
}

async fn delete(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<DashboardIdRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    Ok(Json(SourceService::delete(&state, owner, req).await?))
}

async fn check_sources(
    State(state): State<AppState>,
    Owner(owner): Owner,
    ApiJson(req): ApiJson<CheckSourcesRequest>,
) -> ApiResult<Json<CheckSourcesResponse>> {
    Ok(Json(SourceService::check_sources(&state, owner, req).await?))
}
