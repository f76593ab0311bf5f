//! API request and response types
//!
//! Request fields are optional at the serde level so that a missing field is
//! reported by validation (400) rather than by the JSON decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Body of a business-rule rejection or error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Generic `{success: true}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// `{ok: true, message}` acknowledgement used by the password-reset flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    pub message: String,
}

impl AckResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

// ============================================================================
// User Types
// ============================================================================

/// Registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub id: Uuid,
}

/// Authentication request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticateRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Public user profile; never carries the password digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub id: Uuid,
    pub email: String,
}

/// Authentication response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub user: UserProfile,
    pub token: String,
}

/// Password reset request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub username: Option<String>,
}

/// Password change request (completes a reset)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub password: Option<String>,
}

// ============================================================================
// Dashboard Types
// ============================================================================

/// Dashboard entry in the owner's list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub id: Uuid,
    pub name: String,
    pub views: i32,
}

/// `GET /dashboards/dashboards` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardListResponse {
    pub success: bool,
    pub dashboards: Vec<DashboardSummary>,
}

/// Full dashboard as seen by its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDetail {
    pub id: Uuid,
    pub name: String,
    pub layout: Value,
    pub items: Value,
    pub next_id: i32,
}

/// `GET /dashboards/dashboard` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub dashboard: DashboardDetail,
    pub sources: Vec<String>,
}

/// Dashboard content exposed through the share flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedDashboard {
    pub name: String,
    pub layout: Value,
    pub items: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateDashboardRequest {
    pub name: Option<String>,
}

/// Request naming a dashboard by `id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardIdRequest {
    pub id: Option<String>,
}

/// Query string of `GET /dashboards/dashboard`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardQuery {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveDashboardRequest {
    pub id: Option<String>,
    pub layout: Option<Value>,
    pub items: Option<Value>,
    pub next_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloneDashboardRequest {
    pub dashboard_id: Option<String>,
    pub name: Option<String>,
}

/// Request naming a dashboard by `dashboardId`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareDashboardRequest {
    pub dashboard_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareDashboardResponse {
    pub success: bool,
    pub shared: bool,
}

/// Sets (or clears, when empty) a dashboard's share password; also the body
/// of `check-password`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardPasswordRequest {
    pub dashboard_id: Option<String>,
    pub password: Option<String>,
}

/// Outcome of `check-password-needed`
///
/// `owner` is `"self"` for the owner, the owner's id for an open shared
/// dashboard, and empty when nothing is revealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCheckResponse {
    pub success: bool,
    pub owner: String,
    pub shared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_password: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_needed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<SharedDashboard>,
}

/// Outcome of `check-password`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCheckResponse {
    pub success: bool,
    pub correct_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<SharedDashboard>,
}

// ============================================================================
// Source Types
// ============================================================================

/// Message-broker connection profile as listed to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceView {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceListResponse {
    pub success: bool,
    pub sources: Vec<SourceView>,
}

/// Body of `create-source` and `change-source` (the latter also carries `id`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<String>,
    pub url: Option<String>,
    pub login: Option<String>,
    pub passcode: Option<String>,
    pub vhost: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSourcesRequest {
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSourcesResponse {
    pub success: bool,
    pub new_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let req: RegisterRequest = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(req.username.as_deref(), Some("alice"));
        assert!(req.email.is_none());
        assert!(req.password.is_none());
    }

    #[test]
    fn test_share_check_omits_unset_fields() {
        let resp = ShareCheckResponse {
            success: true,
            owner: String::new(),
            shared: false,
            has_password: None,
            password_needed: None,
            dashboard: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "owner": "", "shared": false}));
    }

    #[test]
    fn test_source_type_uses_wire_name() {
        let req: SourceRequest =
            serde_json::from_str(r#"{"name":"broker","type":"stomp"}"#).unwrap();
        assert_eq!(req.source_type.as_deref(), Some("stomp"));
    }

    #[test]
    fn test_save_dashboard_is_camel_case() {
        let req: SaveDashboardRequest =
            serde_json::from_str(r#"{"id":"x","layout":[],"items":{},"nextId":4}"#).unwrap();
        assert_eq!(req.next_id, Some(4));
    }
}
