use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::borrow::Cow;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    /// A uniqueness rule was hit, usually because a concurrent caller got there first.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GroupError {
    pub fn modem_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "modem",
            key: key.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(Cow<'static, str>),
    /// 404 Not Found
    NotFound,
    /// 409 Conflict
    Conflict(String),
    /// 500 Internal Server Error
    InternalServerError(anyhow::Error),
}

impl ApiError {
    pub fn bad_request<Msg: Into<Cow<'static, str>>>(msg: Msg) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<GroupError> for ApiError {
    fn from(e: GroupError) -> Self {
        match e {
            GroupError::NotFound { .. } => Self::NotFound,
            GroupError::ConstraintViolation(msg) => Self::Conflict(msg),
            GroupError::Store(StoreError::NotFound) => Self::NotFound,
            GroupError::Store(StoreError::ConstraintViolation(msg)) => Self::Conflict(msg),
            GroupError::Store(e) => Self::InternalServerError(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::BadRequest(cow) => (StatusCode::BAD_REQUEST, cow).into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal server error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_error_status_codes() {
        let status = |e: GroupError| ApiError::from(e).into_response().status();

        assert_eq!(status(GroupError::modem_not_found("123")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(GroupError::ConstraintViolation("taken".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(GroupError::Store(StoreError::Database(sqlx::Error::PoolClosed))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
