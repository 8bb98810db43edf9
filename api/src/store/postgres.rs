use super::{Store, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::group::{Group, GroupDetails, GroupStats};
use models::modem::Modem;
use models::sim::{Sim, parse_balance};
use models::status::RecordStatus;
use models::swap::SimSwapRecord;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

#[derive(sqlx::FromRow)]
struct SimRow {
    id: i32,
    modem_id: i32,
    phone_number: Option<String>,
    balance: Option<String>,
    info_extracted_at: Option<DateTime<Utc>>,
    status: RecordStatus,
    created_at: DateTime<Utc>,
}

impl From<SimRow> for Sim {
    fn from(row: SimRow) -> Self {
        Sim {
            id: row.id,
            modem_id: row.modem_id,
            phone_number: row.phone_number,
            balance: row.balance.as_deref().and_then(parse_balance),
            info_extracted_at: row.info_extracted_at,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupDetailsRow {
    id: i32,
    group_name: String,
    modem_id: i32,
    imei: String,
    modem_status: RecordStatus,
    phone_number: Option<String>,
    balance: Option<String>,
    info_extracted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<GroupDetailsRow> for GroupDetails {
    fn from(row: GroupDetailsRow) -> Self {
        GroupDetails {
            id: row.id,
            group_name: row.group_name,
            modem_id: row.modem_id,
            imei: row.imei,
            modem_status: row.modem_status,
            phone_number: row.phone_number,
            balance: row.balance.as_deref().and_then(parse_balance),
            info_extracted_at: row.info_extracted_at,
            created_at: row.created_at,
        }
    }
}

const GROUP_DETAILS_SELECT: &str = "
    SELECT g.id, g.group_name, g.modem_id, m.imei, m.status AS modem_status,
           s.phone_number, s.balance, s.info_extracted_at, g.created_at
    FROM modem_group g
    JOIN modem m ON m.id = g.modem_id
    LEFT JOIN sim s ON s.modem_id = m.id AND s.status = 'active'
    WHERE g.status = 'active' AND m.status = 'active'
";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and applies pending migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .connect(database_url)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_modem(&self, modem_id: i32) -> StoreResult<Option<Modem>> {
        Ok(sqlx::query_as::<_, Modem>(
            "SELECT id, imei, status, created_at FROM modem WHERE id = $1",
        )
        .bind(modem_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_modem_by_imei(&self, imei: &str) -> StoreResult<Option<Modem>> {
        Ok(sqlx::query_as::<_, Modem>(
            "SELECT id, imei, status, created_at FROM modem WHERE imei = $1",
        )
        .bind(imei)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_sim_history(&self, modem_id: i32, limit: i64) -> StoreResult<Vec<Sim>> {
        let rows = sqlx::query_as::<_, SimRow>(
            "
            SELECT id, modem_id, phone_number, balance, info_extracted_at, status, created_at
            FROM sim
            WHERE modem_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(modem_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Sim::from).collect())
    }

    async fn get_active_group(&self, group_id: i32) -> StoreResult<Option<Group>> {
        Ok(sqlx::query_as::<_, Group>(
            "SELECT id, group_name, modem_id, status, created_at
             FROM modem_group WHERE id = $1 AND status = 'active'",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_active_group_by_name(&self, group_name: &str) -> StoreResult<Option<Group>> {
        Ok(sqlx::query_as::<_, Group>(
            "SELECT id, group_name, modem_id, status, created_at
             FROM modem_group WHERE group_name = $1 AND status = 'active'",
        )
        .bind(group_name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_active_group_by_modem(&self, modem_id: i32) -> StoreResult<Option<Group>> {
        Ok(sqlx::query_as::<_, Group>(
            "SELECT id, group_name, modem_id, status, created_at
             FROM modem_group WHERE modem_id = $1 AND status = 'active'",
        )
        .bind(modem_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_group(&self, group_name: &str, modem_id: i32) -> StoreResult<i32> {
        Ok(sqlx::query_scalar::<_, i32>(
            "INSERT INTO modem_group (group_name, modem_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(group_name)
        .bind(modem_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_group_name(&self, group_id: i32, group_name: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE modem_group SET group_name = $2 WHERE id = $1 AND status = 'active'",
        )
        .bind(group_id)
        .bind(group_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_group_modem(&self, group_id: i32, modem_id: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE modem_group SET modem_id = $2 WHERE id = $1 AND status = 'active'",
        )
        .bind(group_id)
        .bind(modem_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retire_group(&self, group_id: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE modem_group SET status = 'inactive' WHERE id = $1 AND status = 'active'",
        )
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retire_orphaned_groups(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            "
            UPDATE modem_group SET status = 'inactive'
            WHERE status = 'active'
            AND modem_id NOT IN (SELECT id FROM modem WHERE status = 'active')
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_active_groups_joined(&self) -> StoreResult<Vec<GroupDetails>> {
        let query = format!("{GROUP_DETAILS_SELECT} ORDER BY g.created_at, g.id");
        let rows = sqlx::query_as::<_, GroupDetailsRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(GroupDetails::from).collect())
    }

    async fn find_active_groups_by_phone(
        &self,
        phone_number: &str,
    ) -> StoreResult<Vec<GroupDetails>> {
        let query = format!(
            "{GROUP_DETAILS_SELECT} AND s.phone_number = $1 ORDER BY s.created_at DESC"
        );
        let rows = sqlx::query_as::<_, GroupDetailsRow>(&query)
            .bind(phone_number)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(GroupDetails::from).collect())
    }

    async fn group_stats(&self) -> StoreResult<GroupStats> {
        let total_groups = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM modem_group WHERE status = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;

        let groups_with_sim_info = sqlx::query_scalar::<_, i64>(
            "
            SELECT COUNT(*) FROM modem_group g
            JOIN modem m ON m.id = g.modem_id
            JOIN sim s ON s.modem_id = m.id
            WHERE g.status = 'active' AND m.status = 'active'
            AND s.status = 'active' AND s.info_extracted_at IS NOT NULL
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(GroupStats {
            total_groups,
            groups_with_sim_info,
            groups_without_sim_info: total_groups - groups_with_sim_info,
        })
    }

    async fn record_sim_swap(&self, record: &SimSwapRecord) -> StoreResult<()> {
        sqlx::query(
            "
            INSERT INTO sim_swap_history (group_id, modem_id, old_phone, new_phone, swapped_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(record.group_id)
        .bind(record.modem_id)
        .bind(&record.old_phone)
        .bind(&record.new_phone)
        .bind(record.swapped_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
