use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Soft-delete state shared by modems, SIMs and groups.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "record_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Inactive,
}

impl RecordStatus {
    pub fn is_active(self) -> bool {
        self == RecordStatus::Active
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::Inactive => write!(f, "inactive"),
        }
    }
}
