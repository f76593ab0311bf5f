//! User service for registration, authentication and password reset
//!
//! # Performance Optimizations
//!
//! - Password hashing/verification runs on blocking thread pool
//! - Token signing uses the pre-computed keys held in state
//! - Reset e-mails are dispatched in the background

use crate::auth::{Identity, PasswordService};
use crate::error::ApiError;
use crate::mailer::{self, RESET_PASSWORD_SUBJECT};
use crate::repositories::{NewUser, StoreError};
use crate::state::AppState;
use dashboard_shared::validation::{validate_email, validate_password, validate_username};
use dashboard_shared::{
    AckResponse, AuthenticateRequest, AuthenticateResponse, ChangePasswordRequest,
    RegisterRequest, RegisterResponse, ResetPasswordRequest,
};
use tracing::{info, warn};

pub const DUPLICATE_USER: &str =
    "Registration Error: A user with that e-mail or username already exists.";
pub const LOGIN_USER_NOT_FOUND: &str = "Authentication Error: User not found.";
pub const PASSWORD_MISMATCH: &str = "Authentication Error: Password does not match!";
pub const USER_NOT_FOUND: &str = "Resource Error: User not found.";
pub const RESET_TOKEN_EXPIRED: &str = " Resource Error: Reset token has expired.";
pub const RESET_EMAIL_SENT: &str = "Forgot password e-mail sent.";
pub const PASSWORD_CHANGED: &str = "Password was changed.";

fn count_login(outcome: &'static str) {
    metrics::counter!("auth_logins_total", "outcome" => outcome).increment(1);
}

fn count_reset(stage: &'static str, outcome: &'static str) {
    metrics::counter!(
        "auth_password_resets_total",
        "stage" => stage,
        "outcome" => outcome
    )
    .increment(1);
}

/// User service for authentication operations
pub struct UserService;

impl UserService {
    /// Register a new user
    ///
    /// The combined username/e-mail lookup is a fast path; the unique
    /// indexes of the store settle concurrent registrations.
    pub async fn register(
        state: &AppState,
        request: RegisterRequest,
    ) -> Result<RegisterResponse, ApiError> {
        let min_length = state.config().auth.password_min_length;
        let username = validate_username(request.username).map_err(ApiError::Validation)?;
        let email = validate_email(request.email).map_err(ApiError::Validation)?;
        let password =
            validate_password(request.password, min_length).map_err(ApiError::Validation)?;

        if state
            .users()
            .find_by_username_or_email(&username, &email)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(DUPLICATE_USER.to_string()));
        }

        // Hash password on blocking thread pool (CPU-intensive)
        let password_hash = state.passwords().hash_async(password).await?;

        let user = match state
            .users()
            .create(NewUser {
                username,
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::UniqueViolation(constraint)) => {
                warn!(constraint = %constraint, "Concurrent duplicate registration");
                return Err(ApiError::Conflict(DUPLICATE_USER.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("auth_registrations_total").increment(1);
        info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(RegisterResponse {
            success: true,
            id: user.id,
        })
    }

    /// Login with username and password
    pub async fn authenticate(
        state: &AppState,
        request: AuthenticateRequest,
    ) -> Result<AuthenticateResponse, ApiError> {
        let min_length = state.config().auth.password_min_length;
        let username = validate_username(request.username).map_err(ApiError::Validation)?;
        let password =
            validate_password(request.password, min_length).map_err(ApiError::Validation)?;

        let Some(user) = state.users().find_by_username(&username).await? else {
            count_login("unknown_user");
            return Err(ApiError::Unauthorized(LOGIN_USER_NOT_FOUND.to_string()));
        };

        // Verify password on blocking thread pool (CPU-intensive)
        let valid = PasswordService::verify_async(password, user.password_hash.clone()).await?;
        if !valid {
            count_login("password_mismatch");
            return Err(ApiError::Unauthorized(PASSWORD_MISMATCH.to_string()));
        }

        let token = state
            .tokens()
            .sign(&Identity::user(user.id, &user.username, &user.email))?;

        count_login("success");
        info!(user_id = %user.id, "User authenticated");

        Ok(AuthenticateResponse {
            user: user.profile(),
            token,
        })
    }

    /// Issue a reset token for `username` and e-mail it
    ///
    /// Any earlier token for the user is deleted before the new one is
    /// stored. An unknown username is reported as not found.
    pub async fn request_password_reset(
        state: &AppState,
        request: ResetPasswordRequest,
    ) -> Result<AckResponse, ApiError> {
        let username = validate_username(request.username).map_err(ApiError::Validation)?;

        let Some(user) = state.users().find_by_username(&username).await? else {
            count_reset("request", "unknown_user");
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        };

        let token = state.tokens().sign(&Identity::reset(&user.username))?;

        // Delete before insert: the other order could drop a newer token
        state.reset_tokens().delete(&user.username).await?;
        state.reset_tokens().insert(&user.username, &token).await?;

        let mail = &state.config().mail;
        let html = mailer::reset_password_email(&token, &mail.platform_uri, &mail.server_uri);
        mailer::dispatch(state.mailer(), user.email.clone(), RESET_PASSWORD_SUBJECT, html);

        count_reset("request", "issued");
        info!(user_id = %user.id, "Password reset requested");

        Ok(AckResponse::new(RESET_EMAIL_SENT))
    }

    /// Set a new password using a verified reset token
    ///
    /// The reset record is consumed only if it still holds `token`, so a
    /// consumed, expired or superseded token all end as `Gone`.
    pub async fn complete_password_reset(
        state: &AppState,
        decoded: &Identity,
        token: &str,
        request: ChangePasswordRequest,
    ) -> Result<AckResponse, ApiError> {
        let min_length = state.config().auth.password_min_length;
        let password =
            validate_password(request.password, min_length).map_err(ApiError::Validation)?;

        let Some(username) = decoded.username.as_deref() else {
            count_reset("complete", "unknown_user");
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        };

        let Some(user) = state.users().find_by_username(username).await? else {
            count_reset("complete", "unknown_user");
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        };

        if !state.reset_tokens().consume(&user.username, token).await? {
            count_reset("complete", "expired");
            return Err(ApiError::Gone(RESET_TOKEN_EXPIRED.to_string()));
        }

        let password_hash = state.passwords().hash_async(password).await?;
        if !state.users().update_password(user.id, &password_hash).await? {
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        }

        count_reset("complete", "changed");
        info!(user_id = %user.id, "Password changed through reset");

        Ok(AckResponse::new(PASSWORD_CHANGED))
    }
}
