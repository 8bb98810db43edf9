use crate::State;
use crate::error::{ApiError, GroupError};
use axum::http::StatusCode;
use axum::{Extension, Json, extract::Path};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

const TAG: &str = "modems";

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupAssignment {
    /// `None` when group auto-creation is disabled.
    pub group_id: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/modems/{imei}/group",
    params(
        ("imei" = String, Path),
    ),
    responses(
        (status = StatusCode::OK, description = "Group assigned to the modem", body = GroupAssignment),
        (status = StatusCode::NOT_FOUND, description = "Unknown modem"),
        (status = StatusCode::CONFLICT, description = "Concurrent registration could not be resolved"),
    ),
    tag = TAG
)]
pub async fn assign_group(
    Path(imei): Path<String>,
    Extension(state): Extension<State>,
) -> Result<Json<GroupAssignment>, ApiError> {
    let group_id = state.groups.assign_modem_to_group(&imei).await?;
    Ok(Json(GroupAssignment { group_id }))
}

#[utoipa::path(
    post,
    path = "/modems/{imei}/sim-extracted",
    params(
        ("imei" = String, Path),
    ),
    responses(
        (status = StatusCode::OK, description = "Group created or kept; SIM swap checked", body = GroupAssignment),
        (status = StatusCode::NOT_FOUND, description = "Unknown modem"),
        (status = StatusCode::INTERNAL_SERVER_ERROR, description = "Failed to look up modem"),
    ),
    tag = TAG
)]
pub async fn sim_extracted(
    Path(imei): Path<String>,
    Extension(state): Extension<State>,
) -> Result<Json<GroupAssignment>, ApiError> {
    let modem = state
        .store
        .get_modem_by_imei(&imei)
        .await
        .map_err(|err| {
            error!("error: failed to get modem for IMEI {imei}: {err}");
            ApiError::InternalServerError(err.into())
        })?
        .ok_or_else(|| GroupError::modem_not_found(&imei))?;

    let group_id = state
        .groups
        .auto_create_group_for_modem(modem.id, &imei)
        .await?;
    Ok(Json(GroupAssignment { group_id }))
}
