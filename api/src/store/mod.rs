use async_trait::async_trait;
use models::group::{Group, GroupDetails, GroupStats};
use models::modem::Modem;
use models::sim::Sim;
use models::swap::SimSwapRecord;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("uniqueness constraint violated: {0}")]
    ConstraintViolation(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::ConstraintViolation(db.message().to_string())
            }
            _ => Self::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence consumed by the group registry.
///
/// Every call is atomic on its own; nothing spans calls. Uniqueness of the
/// active group per modem and of active group names is enforced here, so a
/// lost check-then-insert race shows up as [`StoreError::ConstraintViolation`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_modem(&self, modem_id: i32) -> StoreResult<Option<Modem>>;

    async fn get_modem_by_imei(&self, imei: &str) -> StoreResult<Option<Modem>>;

    /// SIM rows of a modem, most recent first by `created_at` (ties broken
    /// by descending id), at most `limit` rows, whatever their status.
    async fn get_sim_history(&self, modem_id: i32, limit: i64) -> StoreResult<Vec<Sim>>;

    async fn get_active_group(&self, group_id: i32) -> StoreResult<Option<Group>>;

    async fn get_active_group_by_name(&self, group_name: &str) -> StoreResult<Option<Group>>;

    async fn get_active_group_by_modem(&self, modem_id: i32) -> StoreResult<Option<Group>>;

    async fn insert_group(&self, group_name: &str, modem_id: i32) -> StoreResult<i32>;

    async fn update_group_name(&self, group_id: i32, group_name: &str) -> StoreResult<bool>;

    async fn update_group_modem(&self, group_id: i32, modem_id: i32) -> StoreResult<bool>;

    async fn retire_group(&self, group_id: i32) -> StoreResult<bool>;

    /// Retires active groups whose modem is missing or inactive.
    async fn retire_orphaned_groups(&self) -> StoreResult<u64>;

    async fn list_active_groups_joined(&self) -> StoreResult<Vec<GroupDetails>>;

    async fn find_active_groups_by_phone(&self, phone_number: &str)
    -> StoreResult<Vec<GroupDetails>>;

    async fn group_stats(&self) -> StoreResult<GroupStats>;

    async fn record_sim_swap(&self, record: &SimSwapRecord) -> StoreResult<()>;
}
