//! Source service

use crate::error::ApiError;
use crate::repositories::{NewSource, SourceFields, StoreError};
use crate::services::dashboard::parse_id;
use crate::state::AppState;
use dashboard_shared::validation::validate_name;
use dashboard_shared::{
    CheckSourcesRequest, CheckSourcesResponse, DashboardIdRequest, SourceListResponse,
    SourceRequest, SuccessResponse,
};
use tracing::info;
use uuid::Uuid;

pub const SOURCE_EXISTS: &str = "A source with that name already exists.";
pub const SOURCE_NOT_FOUND: &str = "The selected source has not been found.";
pub const SOURCE_NAME_CLASH: &str = "A source with the same name has been found.";

fn not_found() -> ApiError {
    ApiError::Conflict(SOURCE_NOT_FOUND.to_string())
}

fn fields_from(request: SourceRequest) -> Result<SourceFields, ApiError> {
    Ok(SourceFields {
        name: validate_name(request.name).map_err(ApiError::Validation)?,
        source_type: request.source_type.unwrap_or_default(),
        url: request.url.unwrap_or_default(),
        login: request.login.unwrap_or_default(),
        passcode: request.passcode.unwrap_or_default(),
        vhost: request.vhost.unwrap_or_default(),
    })
}

/// Source service
pub struct SourceService;

impl SourceService {
    pub async fn list(state: &AppState, owner: Uuid) -> Result<SourceListResponse, ApiError> {
        let sources = state.sources().list_owned(owner).await?;
        Ok(SourceListResponse {
            success: true,
            sources: sources.iter().map(|s| s.view()).collect(),
        })
    }

    pub async fn create(
        state: &AppState,
        owner: Uuid,
        request: SourceRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let fields = fields_from(request)?;

        if state.sources().name_taken(owner, &fields.name, None).await? {
            return Err(ApiError::Conflict(SOURCE_EXISTS.to_string()));
        }

        match state.sources().create(NewSource { owner, fields }).await {
            Ok(source) => {
                info!(source_id = %source.id, owner = %owner, "Source created");
                Ok(SuccessResponse::ok())
            }
            Err(StoreError::UniqueViolation(_)) => Err(ApiError::Conflict(SOURCE_EXISTS.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace every field of an owned source
    pub async fn change(
        state: &AppState,
        owner: Uuid,
        request: SourceRequest,
    ) -> Result<SuccessResponse, ApiError> {
        let id = parse_id(request.id.as_deref()).ok_or_else(not_found)?;
        let fields = fields_from(request)?;

        if state.sources().find_owned(owner, id).await?.is_none() {
            return Err(not_found());
        }
        if state
            .sources()
            .name_taken(owner, &fields.name, Some(id))
            .await?
        {
            return Err(ApiError::Conflict(SOURCE_NAME_CLASH.to_string()));
        }

        match state.sources().update_owned(owner, id, &fields).await {
            Ok(true) => Ok(SuccessResponse::ok()),
            Ok(false) => Err(not_found()),
            Err(StoreError::UniqueViolation(_)) => {
                Err(ApiError::Conflict(SOURCE_NAME_CLASH.to_string()))
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
        if !state.sources().delete_owned(owner, id).await? {
            return Err(not_found());
        }
        info!(source_id = %id, owner = %owner, "Source deleted");
        Ok(SuccessResponse::ok())
    }

    /// Create a placeholder for every referenced name the owner lacks
    ///
    /// Returns the names that were created, in request order.
    pub async fn check_sources(
        state: &AppState,
        owner: Uuid,
        request: CheckSourcesRequest,
    ) -> Result<CheckSourcesResponse, ApiError> {
        let mut new_sources: Vec<String> = Vec::new();

        for name in request.sources {
            if new_sources.contains(&name)
                || state.sources().name_taken(owner, &name, None).await?
            {
                continue;
            }
            new_sources.push(name);
        }

        for name in &new_sources {
            let source = NewSource {
                owner,
                fields: SourceFields::placeholder(name.clone()),
            };
            match state.sources().create(source).await {
                // Created concurrently by another request
                Ok(_) | Err(StoreError::UniqueViolation(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(CheckSourcesResponse {
            success: true,
            new_sources,
        })
    }
}
