use crate::status::RecordStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Modem {
    pub id: i32,
    pub imei: String,
    pub status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
