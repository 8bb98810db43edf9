use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A SIM replacement inferred from the two most recent SIM rows of a modem.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SwapEvent {
    pub group_name: String,
    pub imei: String,
    pub old_sim_number: String,
    pub new_sim_number: String,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
}

/// Audit trail entry written when a swap is detected.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SimSwapRecord {
    pub group_id: i32,
    pub modem_id: i32,
    pub old_phone: String,
    pub new_phone: String,
    pub swapped_at: chrono::DateTime<chrono::Utc>,
}
