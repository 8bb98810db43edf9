use crate::error::GroupError;
use crate::notification::NotificationDispatcher;
use crate::store::{Store, StoreError};
use crate::swap::SwapDetector;
use models::group::{Group, GroupDetails, GroupStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

pub use namer::{DEFAULT_GROUP_PREFIX, GroupNamer};

pub mod namer;
pub mod route;

const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Owns the group lifecycle: creation on first SIM extraction, renames,
/// manual reassignment and retirement.
///
/// At most one active group may reference a modem. Lookups and inserts are
/// separate store calls, so a concurrent registration can win the race; the
/// store's uniqueness rules turn that into a constraint violation which is
/// resolved here by re-reading the winner's group.
pub struct GroupLifecycle {
    store: Arc<dyn Store>,
    namer: GroupNamer,
    detector: SwapDetector,
    auto_create: AtomicBool,
}

impl GroupLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: NotificationDispatcher,
        group_prefix: impl Into<String>,
    ) -> Self {
        Self {
            namer: GroupNamer::new(store.clone(), group_prefix),
            detector: SwapDetector::new(store.clone(), dispatcher),
            store,
            auto_create: AtomicBool::new(true),
        }
    }

    pub fn enable_auto_create(&self) {
        self.auto_create.store(true, Ordering::SeqCst);
        info!("Group auto-creation enabled");
    }

    pub fn disable_auto_create(&self) {
        self.auto_create.store(false, Ordering::SeqCst);
        info!("Group auto-creation disabled");
    }

    pub fn auto_create_enabled(&self) -> bool {
        self.auto_create.load(Ordering::SeqCst)
    }

    /// Registration entry point. Returns the modem's active group, creating
    /// one if needed. `Ok(None)` means auto-creation is off or a lookup failed.
    #[tracing::instrument(skip(self))]
    pub async fn assign_modem_to_group(&self, imei: &str) -> Result<Option<i32>, GroupError> {
        let modem = match self.store.get_modem_by_imei(imei).await {
            Ok(Some(modem)) => modem,
            Ok(None) => return Err(GroupError::modem_not_found(imei)),
            Err(err) => {
                error!("Failed to look up modem with IMEI {imei}: {err}");
                return Ok(None);
            }
        };

        match self.store.get_active_group_by_modem(modem.id).await {
            Ok(Some(group)) => Ok(Some(group.id)),
            Ok(None) => self.auto_create_group_for_modem(modem.id, imei).await,
            Err(err) => {
                error!("Failed to look up group for modem {}: {err}", modem.id);
                Ok(None)
            }
        }
    }

    /// SIM extraction entry point. Creates the modem's group on first
    /// extraction; afterwards checks the SIM history for a swap and returns
    /// the existing group.
    #[tracing::instrument(skip(self))]
    pub async fn auto_create_group_for_modem(
        &self,
        modem_id: i32,
        imei: &str,
    ) -> Result<Option<i32>, GroupError> {
        if !self.auto_create_enabled() {
            info!("Auto-create disabled, skipping group creation for modem {imei}");
            return Ok(None);
        }

        match self.store.get_active_group_by_modem(modem_id).await {
            Ok(Some(group)) => {
                info!("Modem {imei} already has group: {}", group.group_name);
                self.detector
                    .handle_potential_swap(modem_id, imei, &group)
                    .await;
                Ok(Some(group.id))
            }
            Ok(None) => self.create_group(modem_id, imei).await.map(Some),
            Err(err) => {
                error!("Failed to look up group for modem {modem_id}: {err}");
                Ok(None)
            }
        }
    }

    async fn create_group(&self, modem_id: i32, imei: &str) -> Result<i32, GroupError> {
        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let group_name = self.namer.generate(imei).await;
            match self.store.insert_group(&group_name, modem_id).await {
                Ok(group_id) => {
                    info!("Auto-created group '{group_name}' for modem {imei} (ID: {group_id})");
                    return Ok(group_id);
                }
                Err(StoreError::ConstraintViolation(reason)) => {
                    warn!(
                        "Insert of group '{group_name}' for modem {imei} lost a race (attempt {attempt}): {reason}"
                    );
                    if let Ok(Some(group)) = self.store.get_active_group_by_modem(modem_id).await {
                        info!(
                            "Group '{}' for modem {imei} was created concurrently",
                            group.group_name
                        );
                        return Ok(group.id);
                    }
                }
                Err(err) => {
                    error!("Failed to add group '{group_name}' for modem {modem_id}: {err}");
                    return Err(err.into());
                }
            }
        }

        Err(GroupError::ConstraintViolation(format!(
            "no free group name for modem {imei} after {MAX_INSERT_ATTEMPTS} attempts"
        )))
    }

    /// Renames an active group. `false` when no active group matched, the
    /// name is taken or the store failed.
    pub async fn rename_group(&self, group_id: i32, new_name: &str) -> bool {
        match self.store.update_group_name(group_id, new_name).await {
            Ok(true) => {
                info!("Updated group {group_id} name to '{new_name}'");
                true
            }
            Ok(false) => false,
            Err(StoreError::ConstraintViolation(reason)) => {
                warn!("Cannot rename group {group_id} to '{new_name}': {reason}");
                false
            }
            Err(err) => {
                error!("Failed to update group {group_id} name: {err}");
                false
            }
        }
    }

    /// Points an active group at another modem, keeping its name.
    pub async fn reassign_group_modem(
        &self,
        group_id: i32,
        new_modem_id: i32,
    ) -> Result<bool, GroupError> {
        match self.store.get_modem(new_modem_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(GroupError::modem_not_found(new_modem_id)),
            Err(err) => {
                error!("Failed to look up modem {new_modem_id}: {err}");
                return Ok(false);
            }
        }

        if let Ok(Some(existing)) = self.store.get_active_group_by_modem(new_modem_id).await
            && existing.id != group_id
        {
            return Err(GroupError::ConstraintViolation(format!(
                "modem {new_modem_id} already belongs to group '{}'",
                existing.group_name
            )));
        }

        match self.store.update_group_modem(group_id, new_modem_id).await {
            Ok(true) => {
                info!("Reassigned group {group_id} to modem {new_modem_id}");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(StoreError::ConstraintViolation(reason)) => {
                Err(GroupError::ConstraintViolation(reason))
            }
            Err(err) => {
                error!("Failed to reassign group {group_id} to modem {new_modem_id}: {err}");
                Ok(false)
            }
        }
    }

    /// Soft-deletes a group. The row stays for history.
    pub async fn retire_group(&self, group_id: i32) -> bool {
        match self.store.retire_group(group_id).await {
            Ok(true) => {
                info!("Retired group {group_id}");
                true
            }
            Ok(false) => false,
            Err(err) => {
                error!("Failed to retire group {group_id}: {err}");
                false
            }
        }
    }

    /// Retires groups whose modem is gone or inactive. Returns how many.
    pub async fn cleanup_orphaned_groups(&self) -> u64 {
        match self.store.retire_orphaned_groups().await {
            Ok(retired) => {
                if retired > 0 {
                    info!("Cleaned up {retired} orphaned groups");
                }
                retired
            }
            Err(err) => {
                error!("Failed to cleanup orphaned groups: {err}");
                0
            }
        }
    }

    pub async fn get_group(&self, group_id: i32) -> Option<Group> {
        self.store
            .get_active_group(group_id)
            .await
            .unwrap_or_else(|err| {
                error!("Failed to get group {group_id}: {err}");
                None
            })
    }

    pub async fn get_group_by_name(&self, group_name: &str) -> Option<Group> {
        self.store
            .get_active_group_by_name(group_name)
            .await
            .unwrap_or_else(|err| {
                error!("Failed to get group '{group_name}': {err}");
                None
            })
    }

    pub async fn get_group_by_modem(&self, modem_id: i32) -> Option<Group> {
        self.store
            .get_active_group_by_modem(modem_id)
            .await
            .unwrap_or_else(|err| {
                error!("Failed to get group for modem {modem_id}: {err}");
                None
            })
    }

    /// Group of an active modem, looked up by IMEI.
    pub async fn get_group_by_imei(&self, imei: &str) -> Option<Group> {
        let modem = match self.store.get_modem_by_imei(imei).await {
            Ok(Some(modem)) if modem.status.is_active() => modem,
            Ok(_) => return None,
            Err(err) => {
                error!("Failed to get group for IMEI {imei}: {err}");
                return None;
            }
        };
        self.get_group_by_modem(modem.id).await
    }

    pub async fn list_groups(&self) -> Vec<GroupDetails> {
        self.store
            .list_active_groups_joined()
            .await
            .unwrap_or_else(|err| {
                error!("Failed to get all groups: {err}");
                Vec::new()
            })
    }

    /// Groups whose active SIM carries `phone_number`. Useful to follow a SIM
    /// that moved between modems.
    pub async fn find_groups_by_phone_number(&self, phone_number: &str) -> Vec<GroupDetails> {
        self.store
            .find_active_groups_by_phone(phone_number)
            .await
            .unwrap_or_else(|err| {
                error!("Failed to find groups for phone number {phone_number}: {err}");
                Vec::new()
            })
    }

    pub async fn stats(&self) -> GroupStats {
        self.store.group_stats().await.unwrap_or_else(|err| {
            error!("Failed to get group stats: {err}");
            GroupStats::default()
        })
    }
}
