//! Authorization gate
//!
//! Runs before every protected handler. A bearer token is looked up, in
//! order, in the `token` query parameter, the `x-access-token` header and the
//! `Authorization` header; a leading `"Bearer "` is stripped. Exactly one
//! outcome is produced per request: either the decoded identity is attached
//! to the request extensions and the handler runs, or a single
//! [`AuthError`] is returned.

use super::jwt::{Identity, TokenService};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{FromRef, Query, Request, State},
    http::{
        header::{AsHeaderName, AUTHORIZATION},
        request::Parts,
        HeaderMap, Uri,
    },
    middleware::Next,
    response::Response,
};
use dashboard_shared::AuthError;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Query parameter carrying a token
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Custom header carrying a token
pub const TOKEN_HEADER: &str = "x-access-token";

const BEARER_PREFIX: &str = "Bearer ";

/// Claims of the verified token, attached by [`require_token`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded(pub Identity);

/// The raw token that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

/// Id of the authenticated account, for ownership-scoped handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub Uuid);

/// Identity of the caller when a valid token happens to be present
///
/// Never rejects: a missing or bad token yields `None`.
#[derive(Debug, Clone, Default)]
pub struct MaybeDecoded(pub Option<Identity>);

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn header_value<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(non_empty)
}

/// First non-empty candidate token, in priority order
pub fn locate_token(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let from_query = Query::<HashMap<String, String>>::try_from_uri(uri)
        .ok()
        .and_then(|Query(params)| params.get(TOKEN_QUERY_PARAM).cloned())
        .filter(|token| !token.is_empty());

    from_query
        .or_else(|| header_value(headers, TOKEN_HEADER).map(str::to_string))
        .or_else(|| header_value(headers, AUTHORIZATION).map(str::to_string))
}

/// Remove a leading `"Bearer "` and any whitespace after it
pub fn strip_bearer(candidate: &str) -> &str {
    match candidate.strip_prefix(BEARER_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => candidate,
    }
}

/// Locate and verify the request's token
pub fn authorize(
    uri: &Uri,
    headers: &HeaderMap,
    tokens: &TokenService,
) -> Result<(Identity, String), AuthError> {
    let candidate = locate_token(uri, headers).ok_or(AuthError::TokenMissing)?;
    let token = strip_bearer(&candidate).to_string();
    let identity = tokens.verify(&token)?;
    Ok((identity, token))
}

/// Gate middleware for protected routes
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match authorize(request.uri(), request.headers(), state.tokens()) {
        Ok((identity, token)) => {
            request.extensions_mut().insert(Decoded(identity));
            request.extensions_mut().insert(BearerToken(token));
            Ok(next.run(request).await)
        }
        Err(err) => {
            metrics::counter!("auth_gate_rejections_total", "reason" => err.reason()).increment(1);
            debug!(
                reason = err.reason(),
                path = %request.uri().path(),
                "Request rejected by authorization gate"
            );
            Err(err.into())
        }
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Decoded
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Decoded>()
            .cloned()
            .ok_or(ApiError::Auth(AuthError::TokenMissing))
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BearerToken>()
            .cloned()
            .ok_or(ApiError::Auth(AuthError::TokenMissing))
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Decoded(identity) = Decoded::from_request_parts(parts, state).await?;
        // Reset tokens carry no subject id and cannot own resources
        identity
            .id
            .map(Owner)
            .ok_or(ApiError::Auth(AuthError::TokenInvalid))
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for MaybeDecoded
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let identity = authorize(&parts.uri, &parts.headers, app_state.tokens())
            .ok()
            .map(|(identity, _)| identity);
        Ok(MaybeDecoded(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request as HttpRequest};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use secrecy::SecretString;

    fn tokens() -> TokenService {
        TokenService::new(&SecretString::new("gate-secret".to_string()), 3600, 0)
    }

    fn request(uri: &str, headers: &[(&str, &str)]) -> HttpRequest<()> {
        let mut builder = HttpRequest::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    fn run(req: &HttpRequest<()>) -> Result<(Identity, String), AuthError> {
        authorize(req.uri(), req.headers(), &tokens())
    }

    #[test]
    fn test_no_token_is_missing() {
        let req = request("/dashboards/dashboards", &[]);
        assert_eq!(run(&req), Err(AuthError::TokenMissing));
    }

    #[test]
    fn test_garbage_bearer_is_invalid() {
        let req = request("/", &[("authorization", "Bearer garbage")]);
        assert_eq!(run(&req), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_custom_header_with_and_without_prefix() {
        let identity = Identity::user(Uuid::new_v4(), "alice", "a@x.com");
        let token = tokens().sign(&identity).unwrap();

        let plain = request("/", &[("x-access-token", token.as_str())]);
        assert_eq!(run(&plain).unwrap().0, identity);

        let prefixed = format!("Bearer {}", token);
        let bearer = request("/", &[("x-access-token", prefixed.as_str())]);
        let (decoded, raw) = run(&bearer).unwrap();
        assert_eq!(decoded, identity);
        assert_eq!(raw, token);
    }

    #[test]
    fn test_query_parameter_wins_over_headers() {
        let identity = Identity::reset("alice");
        let token = tokens().sign(&identity).unwrap();

        let uri = format!("/users/changepassword?token={}", token);
        let req = request(&uri, &[("authorization", "Bearer garbage")]);
        assert_eq!(run(&req).unwrap().0, identity);
    }

    #[test]
    fn test_custom_header_wins_over_authorization() {
        let token = tokens().sign(&Identity::reset("alice")).unwrap();
        let req = request(
            "/",
            &[("x-access-token", "garbage"), ("authorization", token.as_str())],
        );
        assert_eq!(run(&req), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_empty_query_token_falls_through() {
        let token = tokens().sign(&Identity::reset("alice")).unwrap();
        let req = request("/?token=", &[("x-access-token", token.as_str())]);
        assert!(run(&req).is_ok());
    }

    #[test]
    fn test_non_utf8_header_is_absent() {
        let mut req = request("/", &[]);
        req.headers_mut().insert(
            TOKEN_HEADER,
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );
        assert_eq!(run(&req), Err(AuthError::TokenMissing));
    }

    #[test]
    fn test_expired_token_rejected_once_as_expired() {
        let service = tokens();
        let token = service
            .sign_at(&Identity::reset("alice"), Utc::now() - Duration::hours(2))
            .unwrap();
        let req = request("/", &[("authorization", token.as_str())]);
        assert_eq!(run(&req), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("Bearer    abc"), "abc");
        assert_eq!(strip_bearer("Bearer "), "");
        assert_eq!(strip_bearer("bearer abc"), "bearer abc");
        assert_eq!(strip_bearer("abc"), "abc");
    }

    proptest! {
        #[test]
        fn prop_bearer_prefix_is_transparent(spaces in " {0,8}") {
            let identity = Identity::user(Uuid::new_v4(), "alice", "a@x.com");
            let token = tokens().sign(&identity).unwrap();
            let header = format!("Bearer {}{}", spaces, token);
            let req = request("/", &[("authorization", header.as_str())]);
            prop_assert_eq!(run(&req).unwrap().0, identity);
        }

        #[test]
        fn prop_arbitrary_tokens_are_invalid_not_missing(token in "[A-Za-z0-9._-]{1,64}") {
            let req = request("/", &[("x-access-token", token.as_str())]);
            prop_assert_eq!(run(&req), Err(AuthError::TokenInvalid));
        }
    }
}
