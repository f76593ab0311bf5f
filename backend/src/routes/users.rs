//! User account routes
//!
//! Registration, login and the two-step password reset. Only
//! `/changepassword` sits behind the authorization gate; it expects the
//! token that was e-mailed by `/resetpassword`.

use super::ApiJson;
use crate::auth::{require_token, BearerToken, Decoded};
use crate::error::ApiResult;
use crate::services::UserService;
use crate::state::AppState;
use axum::{extract::State, middleware, routing::post, Json, Router};
use dashboard_shared::{
    AckResponse, AuthenticateRequest, AuthenticateResponse, ChangePasswordRequest,
    RegisterRequest, RegisterResponse, ResetPasswordRequest,
};

/// Create user routes
pub fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/changepassword", post(change_password))
        .route_layer(middleware::from_fn_with_state(state, require_token))
        .route("/create", post(create))
        .route("/authenticate", post(authenticate))
        .route("/resetpassword", post(reset_password))
}

/// POST /users/create
async fn create(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let response = UserService::register(&state, req).await?;
    Ok(Json(response))
}

/// POST /users/authenticate
async fn authenticate(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AuthenticateRequest>,
) -> ApiResult<Json<AuthenticateResponse>> {
    let response = UserService::authenticate(&state, req).await?;
    Ok(Json(response))
}

/// POST /users/resetpassword
async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<AckResponse>> {
    let response = UserService::request_password_reset(&state, req).await?;
    Ok(Json(response))
}

/// POST /users/changepassword
async fn change_password(
    State(state): State<AppState>,
    Decoded(identity): Decoded,
    BearerToken(token): BearerToken,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<AckResponse>> {
    let response = UserService::complete_password_reset(&state, &identity, &token, req).await?;
    Ok(Json(response))
}
