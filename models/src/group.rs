use crate::status::RecordStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable label bound to a modem. The name does not encode the SIM, so it
/// survives SIM swaps.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, sqlx::FromRow)]
pub struct Group {
    pub id: i32,
    pub group_name: String,
    pub modem_id: i32,
    pub status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An active group joined with its modem and the modem's active SIM.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupDetails {
    pub id: i32,
    pub group_name: String,
    pub modem_id: i32,
    pub imei: String,
    pub modem_status: RecordStatus,
    pub phone_number: Option<String>,
    pub balance: Option<Decimal>,
    pub info_extracted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct GroupStats {
    pub total_groups: i64,
    pub groups_with_sim_info: i64,
    pub groups_without_sim_info: i64,
}
