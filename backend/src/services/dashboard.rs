//! Dashboard service
//!
//! Owner-scoped operations go through the `*_owned` repository calls, so a
//! dashboard belonging to someone else is reported exactly like a missing
//! one. The share flows are the only unscoped reads.

use crate::auth::{Identity, PasswordService};
use crate::error::ApiError;
use crate::repositories::{DashboardLayout, NewDashboard, StoreError};
use crate::state::AppState;
use dashboard_shared::validation::validate_name;
use dashboard_shared::{
    CloneDashboardRequest, CreateDashboardRequest, DashboardIdRequest, DashboardListResponse,
    DashboardPasswordRequest, DashboardQuery, DashboardResponse, PasswordCheckResponse,
    SaveDashboardRequest, ShareCheckResponse, ShareDashboardRequest, ShareDashboardResponse,
    SuccessResponse,
};
use tracing::info;
use uuid::Uuid;

pub const DASHBOARD_EXISTS: &str = "A dashboard with that name already exists.";
pub const DASHBOARD_NOT_FOUND: &str = "The selected dashboard has not been found.";
/// Wording used by the share and password routes
pub const SHARED_DASHBOARD_NOT_FOUND: &str = "The specified dashboard has not been found.";

/// `owner` value telling the caller the dashboard is their own
const OWNER_SELF: &str = "self";

/// Parse a client-supplied id; anything unparseable matches nothing
pub fn parse_id(id: Option<&str>) -> Option<Uuid> {
    id.and_then(|id| Uuid::parse_str(id.trim()).ok())
}

fn not_found() -> ApiError {
    ApiError::Conflict(DASHBOARD_NOT_FOUND.to_string())
}

fn shared_not_found() -> ApiError {
    ApiError::Conflict(SHARED_DASHBOARD_NOT_FOUND.to_string())
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(format!("{} is a required field", field)))
}

/// Dashboard service
pub struct DashboardService;

impl DashboardService {
    pub async fn list(state: &AppState, owner: Uuid) -> Result<DashboardListResponse, ApiError> {
        let dashboards = state.dashboards().list_owned(owner).await?;
        Ok(DashboardListResponse {
            success: true,
            dashboards: dashboards.iter().map(|d| d.summary()).collect(),
        })
    }

    pub async fn create(
        state: &AppState,
        owner: Uuid,
        request: CreateDashboardRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let name = validate_name(request.name).map_err(ApiError::Validation)?;

        if state.dashboards().name_taken(owner, &name).await? {
            return Err(ApiError::Conflict(DASHBOARD_EXISTS.to_string()));
        }

        match state.dashboards().create(NewDashboard::empty(name, owner)).await {
            Ok(dashboard) => {
                info!(dashboard_id = %dashboard.id, owner = %owner, "Dashboard created");
                Ok(SuccessResponse::ok())
            }
            Err(StoreError::UniqueViolation(_)) => {
                Err(ApiError::Conflict(DASHBOARD_EXISTS.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(
        state: &AppState,
        owner: Uuid,
        request: DashboardIdRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let id = parse_id(request.id.as_deref()).ok_or_else(not_found)?;
        if !state.dashboards().delete_owned(owner, id).await? {
            return Err(not_found());
        }
        info!(dashboard_id = %id, owner = %owner, "Dashboard deleted");
        Ok(SuccessResponse::ok())
    }

    /// The dashboard plus the names of all the owner's sources
    pub async fn get(
        state: &AppState,
        owner: Uuid,
        query: DashboardQuery,
    ) -> Result<DashboardResponse, ApiError> {
        let id = parse_id(query.id.as_deref()).ok_or_else(not_found)?;
        let dashboard = state
            .dashboards()
            .find_owned(owner, id)
            .await?
            .ok_or_else(not_found)?;

        let sources = state.sources().list_owned(owner).await?;

        Ok(DashboardResponse {
            success: true,
            dashboard: dashboard.detail(),
            sources: sources.into_iter().map(|s| s.name).collect(),
        })
    }

    pub async fn save(
        state: &AppState,
        owner: Uuid,
        request: SaveDashboardRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let layout = DashboardLayout {
            layout: required(request.layout, "layout")?,
            items: required(request.items, "items")?,
            next_id: required(request.next_id, "nextId")?,
        };
        let id = parse_id(request.id.as_deref()).ok_or_else(not_found)?;

        if !state.dashboards().save_layout_owned(owner, id, &layout).await? {
            return Err(not_found());
        }
        Ok(SuccessResponse::ok())
    }

    /// Copy an owned dashboard's content under a new name
    pub async fn clone(
        state: &AppState,
        owner: Uuid,
        request: CloneDashboardRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let name = validate_name(request.name).map_err(ApiError::Validation)?;

        if state.dashboards().name_taken(owner, &name).await? {
            return Err(ApiError::Conflict(DASHBOARD_EXISTS.to_string()));
        }

        let id = parse_id(request.dashboard_id.as_deref()).ok_or_else(not_found)?;
        let source = state
            .dashboards()
            .find_owned(owner, id)
            .await?
            .ok_or_else(not_found)?;

        let copy = NewDashboard {
            name,
            layout: source.layout,
            items: source.items,
            next_id: source.next_id,
            owner,
        };
        match state.dashboards().create(copy).await {
            Ok(dashboard) => {
                info!(dashboard_id = %dashboard.id, from = %id, "Dashboard cloned");
                Ok(SuccessResponse::ok())
            }
            Err(StoreError::UniqueViolation(_)) => {
                Err(ApiError::Conflict(DASHBOARD_EXISTS.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Toggle public sharing
    pub async fn share(
        state: &AppState,
        owner: Uuid,
        request: ShareDashboardRequest,
    ) -> Result<ShareDashboardResponse, ApiError> {
        let id = parse_id(request.dashboard_id.as_deref()).ok_or_else(shared_not_found)?;
        let shared = state
            .dashboards()
            .toggle_shared_owned(owner, id)
            .await?
            .ok_or_else(shared_not_found)?;

        info!(dashboard_id = %id, shared, "Dashboard sharing changed");
        Ok(ShareDashboardResponse {
            success: true,
            shared,
        })
    }

    /// Set the viewing password; an empty or absent password removes it
    pub async fn change_password(
        state: &AppState,
        owner: Uuid,
        request: DashboardPasswordRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let id = parse_id(request.dashboard_id.as_deref()).ok_or_else(shared_not_found)?;

        let password_hash = match request.password.filter(|p| !p.trim().is_empty()) {
            Some(password) => Some(state.passwords().hash_async(password).await?),
            None => None,
        };

        if !state
            .dashboards()
            .set_password_owned(owner, id, password_hash.as_deref())
            .await?
        {
            return Err(shared_not_found());
        }
        Ok(SuccessResponse::ok())
    }

    /// What a visitor may see of a dashboard before any password check
    pub async fn check_password_needed(
        state: &AppState,
        caller: Option<&Identity>,
        request: ShareDashboardRequest,
    ) -> Result<ShareCheckResponse, ApiError> {
        let id = parse_id(request.dashboard_id.as_deref()).ok_or_else(shared_not_found)?;
        let dashboard = state
            .dashboards()
            .find_by_id(id)
            .await?
            .ok_or_else(shared_not_found)?;

        let is_owner = caller.and_then(|identity| identity.id) == Some(dashboard.owner);
        let response = if is_owner {
            state.dashboards().record_view(id).await?;
            ShareCheckResponse {
                success: true,
                owner: OWNER_SELF.to_string(),
                shared: dashboard.shared,
                has_password: Some(dashboard.has_password()),
                password_needed: None,
                dashboard: Some(dashboard.shared_view()),
            }
        } else if !dashboard.shared {
            ShareCheckResponse {
                success: true,
                owner: String::new(),
                shared: false,
                has_password: None,
                password_needed: None,
                dashboard: None,
            }
        } else if !dashboard.has_password() {
            state.dashboards().record_view(id).await?;
            ShareCheckResponse {
                success: true,
                owner: dashboard.owner.to_string(),
                shared: true,
                has_password: None,
                password_needed: Some(false),
                dashboard: Some(dashboard.shared_view()),
            }
        } else {
            ShareCheckResponse {
                success: true,
                owner: String::new(),
                shared: true,
                has_password: None,
                password_needed: Some(true),
                dashboard: None,
            }
        };

        Ok(response)
    }

    /// Unlock a shared, password-protected dashboard
    pub async fn check_password(
        state: &AppState,
        request: DashboardPasswordRequest,
    ) -> Result<PasswordCheckResponse, ApiError> {
        let id = parse_id(request.dashboard_id.as_deref()).ok_or_else(shared_not_found)?;
        let dashboard = state
            .dashboards()
            .find_by_id(id)
            .await?
            .ok_or_else(shared_not_found)?;

        let correct = match (&dashboard.password_hash, request.password) {
            (Some(digest), Some(password)) if dashboard.shared => {
                PasswordService::verify_async(password, digest.clone()).await?
            }
            _ => false,
        };

        if !correct {
            return Ok(PasswordCheckResponse {
                success: true,
                correct_password: false,
                owner: None,
                dashboard: None,
            });
        }

        state.dashboards().record_view(id).await?;
        Ok(PasswordCheckResponse {
            success: true,
            correct_password: true,
            owner: Some(dashboard.owner),
            dashboard: Some(dashboard.shared_view()),
        })
    }
}
