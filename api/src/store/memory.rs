use super::{Store, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::group::{Group, GroupDetails, GroupStats};
use models::modem::Modem;
use models::sim::{Sim, parse_balance};
use models::status::RecordStatus;
use models::swap::SimSwapRecord;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Tables {
    modems: Vec<Modem>,
    sims: Vec<Sim>,
    groups: Vec<Group>,
    sim_swaps: Vec<SimSwapRecord>,
    failing: bool,
    failing_audit: bool,
}

impl Tables {
    fn next_id(ids: impl Iterator<Item = i32>) -> i32 {
        ids.max().unwrap_or(0) + 1
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    fn active_modem(&self, modem_id: i32) -> Option<&Modem> {
        self.modems
            .iter()
            .find(|modem| modem.id == modem_id && modem.status.is_active())
    }

    fn active_sim(&self, modem_id: i32) -> Option<&Sim> {
        self.sims
            .iter()
            .filter(|sim| sim.modem_id == modem_id && sim.status.is_active())
            .max_by_key(|sim| (sim.created_at, sim.id))
    }

    fn details(&self, group: &Group) -> Option<GroupDetails> {
        let modem = self.active_modem(group.modem_id)?;
        let sim = self.active_sim(group.modem_id);
        Some(GroupDetails {
            id: group.id,
            group_name: group.group_name.clone(),
            modem_id: group.modem_id,
            imei: modem.imei.clone(),
            modem_status: modem.status,
            phone_number: sim.and_then(|sim| sim.phone_number.clone()),
            balance: sim.and_then(|sim| sim.balance),
            info_extracted_at: sim.and_then(|sim| sim.info_extracted_at),
            created_at: group.created_at,
        })
    }

    fn active_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(|group| group.status.is_active())
    }

    fn ensure_unique(&self, skip_id: Option<i32>, name: &str, modem_id: i32) -> StoreResult<()> {
        for group in self.active_groups().filter(|group| Some(group.id) != skip_id) {
            if group.group_name == name {
                return Err(StoreError::ConstraintViolation(format!(
                    "active group name '{name}' already exists"
                )));
            }
            if group.modem_id == modem_id {
                return Err(StoreError::ConstraintViolation(format!(
                    "modem {modem_id} already has an active group"
                )));
            }
        }
        Ok(())
    }
}

/// In-process [`Store`] with the same uniqueness rules as the Postgres schema.
///
/// The inherent methods stand in for the external registration and SIM
/// extraction flows.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_modem(&self, imei: &str) -> i32 {
        let mut tables = self.lock();
        let id = Tables::next_id(tables.modems.iter().map(|modem| modem.id));
        tables.modems.push(Modem {
            id,
            imei: imei.to_string(),
            status: RecordStatus::Active,
            created_at: Utc::now(),
        });
        id
    }

    pub fn set_modem_status(&self, modem_id: i32, status: RecordStatus) {
        let mut tables = self.lock();
        if let Some(modem) = tables.modems.iter_mut().find(|modem| modem.id == modem_id) {
            modem.status = status;
        }
    }

    pub fn remove_modem(&self, modem_id: i32) {
        self.lock().modems.retain(|modem| modem.id != modem_id);
    }

    pub fn add_sim(&self, modem_id: i32, phone_number: Option<&str>, balance: Option<&str>) -> i32 {
        self.add_sim_at(modem_id, phone_number, balance, Utc::now())
    }

    /// Appends a SIM extraction. The new row becomes the modem's only active
    /// SIM; older rows stay in the history as inactive.
    pub fn add_sim_at(
        &self,
        modem_id: i32,
        phone_number: Option<&str>,
        balance: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> i32 {
        let mut tables = self.lock();
        let id = Tables::next_id(tables.sims.iter().map(|sim| sim.id));
        for sim in tables.sims.iter_mut().filter(|sim| sim.modem_id == modem_id) {
            sim.status = RecordStatus::Inactive;
        }
        tables.sims.push(Sim {
            id,
            modem_id,
            phone_number: phone_number.map(str::to_string),
            balance: balance.and_then(parse_balance),
            info_extracted_at: phone_number.map(|_| created_at),
            status: RecordStatus::Active,
            created_at,
        });
        id
    }

    pub fn groups(&self) -> Vec<Group> {
        self.lock().groups.clone()
    }

    pub fn sim_swaps(&self) -> Vec<SimSwapRecord> {
        self.lock().sim_swaps.clone()
    }

    /// Makes every subsequent call fail as if the database were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn set_failing_audit(&self, failing: bool) {
        self.lock().failing_audit = failing;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_modem(&self, modem_id: i32) -> StoreResult<Option<Modem>> {
        let tables = self.lock();
        tables.check()?;
        Ok(tables.modems.iter().find(|modem| modem.id == modem_id).cloned())
    }

    async fn get_modem_by_imei(&self, imei: &str) -> StoreResult<Option<Modem>> {
        let tables = self.lock();
        tables.check()?;
        Ok(tables.modems.iter().find(|modem| modem.imei == imei).cloned())
    }

    async fn get_sim_history(&self, modem_id: i32, limit: i64) -> StoreResult<Vec<Sim>> {
        let tables = self.lock();
        tables.check()?;
        let mut history: Vec<Sim> = tables
            .sims
            .iter()
            .filter(|sim| sim.modem_id == modem_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        history.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(history)
    }

    async fn get_active_group(&self, group_id: i32) -> StoreResult<Option<Group>> {
        let tables = self.lock();
        tables.check()?;
        Ok(tables.active_groups().find(|group| group.id == group_id).cloned())
    }

    async fn get_active_group_by_name(&self, group_name: &str) -> StoreResult<Option<Group>> {
        let tables = self.lock();
        tables.check()?;
        Ok(tables
            .active_groups()
            .find(|group| group.group_name == group_name)
            .cloned())
    }

    async fn get_active_group_by_modem(&self, modem_id: i32) -> StoreResult<Option<Group>> {
        let tables = self.lock();
        tables.check()?;
        Ok(tables
            .active_groups()
            .find(|group| group.modem_id == modem_id)
            .cloned())
    }

    async fn insert_group(&self, group_name: &str, modem_id: i32) -> StoreResult<i32> {
        let mut tables = self.lock();
        tables.check()?;
        tables.ensure_unique(None, group_name, modem_id)?;
        let id = Tables::next_id(tables.groups.iter().map(|group| group.id));
        tables.groups.push(Group {
            id,
            group_name: group_name.to_string(),
            modem_id,
            status: RecordStatus::Active,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_group_name(&self, group_id: i32, group_name: &str) -> StoreResult<bool> {
        let mut tables = self.lock();
        tables.check()?;
        let Some(modem_id) = tables
            .active_groups()
            .find(|group| group.id == group_id)
            .map(|group| group.modem_id)
        else {
            return Ok(false);
        };
        tables.ensure_unique(Some(group_id), group_name, modem_id)?;
        if let Some(group) = tables.groups.iter_mut().find(|group| group.id == group_id) {
            group.group_name = group_name.to_string();
        }
        Ok(true)
    }

    async fn update_group_modem(&self, group_id: i32, modem_id: i32) -> StoreResult<bool> {
        let mut tables = self.lock();
        tables.check()?;
        let Some(group_name) = tables
            .active_groups()
            .find(|group| group.id == group_id)
            .map(|group| group.group_name.clone())
        else {
            return Ok(false);
        };
        tables.ensure_unique(Some(group_id), &group_name, modem_id)?;
        if let Some(group) = tables.groups.iter_mut().find(|group| group.id == group_id) {
            group.modem_id = modem_id;
        }
        Ok(true)
    }

    async fn retire_group(&self, group_id: i32) -> StoreResult<bool> {
        let mut tables = self.lock();
        tables.check()?;
        match tables
            .groups
            .iter_mut()
            .find(|group| group.id == group_id && group.status.is_active())
        {
            Some(group) => {
                group.status = RecordStatus::Inactive;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn retire_orphaned_groups(&self) -> StoreResult<u64> {
        let mut tables = self.lock();
        tables.check()?;
        let active_modems: Vec<i32> = tables
            .modems
            .iter()
            .filter(|modem| modem.status.is_active())
            .map(|modem| modem.id)
            .collect();
        let mut retired = 0;
        for group in tables.groups.iter_mut() {
            if group.status.is_active() && !active_modems.contains(&group.modem_id) {
                group.status = RecordStatus::Inactive;
                retired += 1;
            }
        }
        Ok(retired)
    }

    async fn list_active_groups_joined(&self) -> StoreResult<Vec<GroupDetails>> {
        let tables = self.lock();
        tables.check()?;
        let mut groups: Vec<GroupDetails> = tables
            .active_groups()
            .filter_map(|group| tables.details(group))
            .collect();
        groups.sort_by_key(|group| (group.created_at, group.id));
        Ok(groups)
    }

    async fn find_active_groups_by_phone(
        &self,
        phone_number: &str,
    ) -> StoreResult<Vec<GroupDetails>> {
        let tables = self.lock();
        tables.check()?;
        Ok(tables
            .active_groups()
            .filter_map(|group| tables.details(group))
            .filter(|group| group.phone_number.as_deref() == Some(phone_number))
            .collect())
    }

    async fn group_stats(&self) -> StoreResult<GroupStats> {
        let tables = self.lock();
        tables.check()?;
        let total_groups = tables.active_groups().count() as i64;
        let groups_with_sim_info = tables
            .active_groups()
            .filter_map(|group| tables.details(group))
            .filter(|group| group.info_extracted_at.is_some())
            .count() as i64;
        Ok(GroupStats {
            total_groups,
            groups_with_sim_info,
            groups_without_sim_info: total_groups - groups_with_sim_info,
        })
    }

    async fn record_sim_swap(&self, record: &SimSwapRecord) -> StoreResult<()> {
        let mut tables = self.lock();
        tables.check()?;
        if tables.failing_audit {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        tables.sim_swaps.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    #[tokio::test]
    async fn test_sim_history_is_most_recent_first_and_limited() {
        let store = MemoryStore::new();
        let modem_id = store.add_modem("356938035643809");
        let t0 = Utc::now();
        store.add_sim_at(modem_id, Some("0550000001"), Some("10.00"), t0);
        store.add_sim_at(modem_id, Some("0550000003"), Some("30.00"), t0 + Duration::minutes(2));
        store.add_sim_at(modem_id, Some("0550000002"), Some("20.00"), t0 + Duration::minutes(1));

        let history = store.get_sim_history(modem_id, 2).await.unwrap();
        let numbers: Vec<_> = history.iter().map(|sim| sim.known_phone_number()).collect();
        assert_eq!(numbers, vec![Some("0550000003"), Some("0550000002")]);
    }

    #[tokio::test]
    async fn test_sim_history_breaks_timestamp_ties_by_id() {
        let store = MemoryStore::new();
        let modem_id = store.add_modem("356938035643809");
        let t0 = Utc::now();
        store.add_sim_at(modem_id, Some("A"), None, t0);
        store.add_sim_at(modem_id, Some("B"), None, t0);

        let history = store.get_sim_history(modem_id, 2).await.unwrap();
        assert_eq!(history[0].known_phone_number(), Some("B"));
        assert_eq!(history[1].known_phone_number(), Some("A"));
    }

    #[tokio::test]
    async fn test_insert_group_rejects_second_active_group_for_modem() {
        let store = MemoryStore::new();
        let modem_id = store.add_modem("356938035643809");
        store.insert_group("GROUP_643809", modem_id).await.unwrap();

        assert_matches!(
            store.insert_group("GROUP_other", modem_id).await,
            Err(StoreError::ConstraintViolation(_))
        );
    }

    #[tokio::test]
    async fn test_retired_group_frees_name_and_modem() {
        let store = MemoryStore::new();
        let modem_id = store.add_modem("356938035643809");
        let id = store.insert_group("GROUP_643809", modem_id).await.unwrap();
        assert!(store.retire_group(id).await.unwrap());

        let second = store.insert_group("GROUP_643809", modem_id).await.unwrap();
        assert_ne!(id, second);
    }

    #[tokio::test]
    async fn test_failing_store_reports_database_error() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert_matches!(
            store.get_modem_by_imei("356938035643809").await,
            Err(StoreError::Database(_))
        );
    }
}
