use crate::State;
use crate::error::ApiError;
use axum::http::StatusCode;
use axum::{Extension, Json, extract::Path};
use models::group::{Group, GroupDetails, GroupStats};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const TAG: &str = "groups";

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameGroup {
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReassignGroup {
    pub modem_id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResult {
    pub retired: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AutoCreate {
    pub enabled: bool,
}

#[utoipa::path(
    get,
    path = "/groups",
    responses(
        (status = StatusCode::OK, description = "Active groups with modem and SIM details", body = Vec<GroupDetails>),
    ),
    tag = TAG
)]
pub async fn get_groups(Extension(state): Extension<State>) -> Json<Vec<GroupDetails>> {
    Json(state.groups.list_groups().await)
}

#[utoipa::path(
    get,
    path = "/groups/stats",
    responses(
        (status = StatusCode::OK, description = "Group counts", body = GroupStats),
    ),
    tag = TAG
)]
pub async fn get_group_stats(Extension(state): Extension<State>) -> Json<GroupStats> {
    Json(state.groups.stats().await)
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}",
    params(
        ("group_id" = i32, Path),
    ),
    responses(
        (status = StatusCode::OK, description = "Return found group", body = Group),
        (status = StatusCode::NOT_FOUND, description = "No active group with this id"),
    ),
    tag = TAG
)]
pub async fn get_group_by_id(
    Path(group_id): Path<i32>,
    Extension(state): Extension<State>,
) -> Result<Json<Group>, ApiError> {
    state
        .groups
        .get_group(group_id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[utoipa::path(
    delete,
    path = "/groups/{group_id}",
    params(
        ("group_id" = i32, Path),
    ),
    responses(
        (status = StatusCode::NO_CONTENT, description = "Group retired"),
        (status = StatusCode::NOT_FOUND, description = "No active group with this id"),
    ),
    tag = TAG
)]
pub async fn retire_group(
    Path(group_id): Path<i32>,
    Extension(state): Extension<State>,
) -> StatusCode {
    if state.groups.retire_group(group_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[utoipa::path(
    get,
    path = "/groups/by-phone/{phone_number}",
    params(
        ("phone_number" = String, Path),
    ),
    responses(
        (status = StatusCode::OK, description = "Groups whose active SIM has this number", body = Vec<GroupDetails>),
    ),
    tag = TAG
)]
pub async fn get_groups_by_phone(
    Path(phone_number): Path<String>,
    Extension(state): Extension<State>,
) -> Json<Vec<GroupDetails>> {
    Json(state.groups.find_groups_by_phone_number(&phone_number).await)
}

#[utoipa::path(
    put,
    path = "/groups/{group_id}/name",
    params(
        ("group_id" = i32, Path),
    ),
    request_body = RenameGroup,
    responses(
        (status = StatusCode::OK, description = "Group renamed"),
        (status = StatusCode::BAD_REQUEST, description = "Empty name"),
        (status = StatusCode::NOT_FOUND, description = "No active group with this id"),
        (status = StatusCode::CONFLICT, description = "Another active group already uses the name"),
    ),
    tag = TAG
)]
pub async fn rename_group(
    Path(group_id): Path<i32>,
    Extension(state): Extension<State>,
    Json(body): Json<RenameGroup>,
) -> Result<StatusCode, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Group name must not be empty"));
    }

    if let Some(holder) = state.groups.get_group_by_name(name).await
        && holder.id != group_id
    {
        return Err(ApiError::Conflict(format!(
            "group name '{name}' is already in use"
        )));
    }

    if state.groups.rename_group(group_id, name).await {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound)
    }
}

#[utoipa::path(
    put,
    path = "/groups/{group_id}/modem",
    params(
        ("group_id" = i32, Path),
    ),
    request_body = ReassignGroup,
    responses(
        (status = StatusCode::OK, description = "Group now points at the modem"),
        (status = StatusCode::NOT_FOUND, description = "Group or modem not found"),
        (status = StatusCode::CONFLICT, description = "Modem already has an active group"),
    ),
    tag = TAG
)]
pub async fn reassign_group(
    Path(group_id): Path<i32>,
    Extension(state): Extension<State>,
    Json(body): Json<ReassignGroup>,
) -> Result<StatusCode, ApiError> {
    if state
        .groups
        .reassign_group_modem(group_id, body.modem_id)
        .await?
    {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound)
    }
}

#[utoipa::path(
    post,
    path = "/groups/cleanup",
    responses(
        (status = StatusCode::OK, description = "Orphaned groups retired", body = CleanupResult),
    ),
    tag = TAG
)]
pub async fn cleanup_groups(Extension(state): Extension<State>) -> Json<CleanupResult> {
    Json(CleanupResult {
        retired: state.groups.cleanup_orphaned_groups().await,
    })
}

#[utoipa::path(
    get,
    path = "/groups/auto-create",
    responses(
        (status = StatusCode::OK, description = "Whether groups are created on SIM extraction", body = AutoCreate),
    ),
    tag = TAG
)]
pub async fn get_auto_create(Extension(state): Extension<State>) -> Json<AutoCreate> {
    Json(AutoCreate {
        enabled: state.groups.auto_create_enabled(),
    })
}

#[utoipa::path(
    put,
    path = "/groups/auto-create",
    request_body = AutoCreate,
    responses(
        (status = StatusCode::OK, description = "Auto-create flag updated", body = AutoCreate),
    ),
    tag = TAG
)]
pub async fn set_auto_create(
    Extension(state): Extension<State>,
    Json(body): Json<AutoCreate>,
) -> Json<AutoCreate> {
    if body.enabled {
        state.groups.enable_auto_create();
    } else {
        state.groups.disable_auto_create();
    }
    Json(body)
}
