#![allow(dead_code)]

use async_trait::async_trait;
use models::group::{Group, GroupDetails, GroupStats};
use models::modem::Modem;
use models::sim::Sim;
use models::swap::{SimSwapRecord, SwapEvent};
use simpulse::group::{DEFAULT_GROUP_PREFIX, GroupLifecycle};
use simpulse::notification::{NotificationDispatcher, Notifier};
use simpulse::store::{MemoryStore, Store, StoreResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const IMEI: &str = "356938035643809";

/// Forwards every delivered event to a channel the test can await.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<SwapEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SwapEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify_sim_swap(&self, event: &SwapEvent) -> anyhow::Result<()> {
        self.sender.send(event.clone())?;
        Ok(())
    }
}

pub async fn next_event(receiver: &mut mpsc::UnboundedReceiver<SwapEvent>) -> Option<SwapEvent> {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .ok()
        .flatten()
}

pub struct Registry {
    pub store: Arc<MemoryStore>,
    pub groups: GroupLifecycle,
    pub events: mpsc::UnboundedReceiver<SwapEvent>,
}

/// Lifecycle over a fresh in-memory store with a channel notifier registered.
pub fn registry() -> Registry {
    let store = Arc::new(MemoryStore::new());
    let (notifier, events) = ChannelNotifier::new();
    let dispatcher = NotificationDispatcher::new(Some(notifier), 16);
    let groups = GroupLifecycle::new(store.clone(), dispatcher, DEFAULT_GROUP_PREFIX);
    Registry {
        store,
        groups,
        events,
    }
}

/// Answers the first "active group for modem" lookup with `None`, as if a
/// concurrent caller committed its group right after this caller checked.
pub struct StaleFirstLookup {
    inner: Arc<MemoryStore>,
    stale: AtomicBool,
}

impl StaleFirstLookup {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            stale: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Store for StaleFirstLookup {
    async fn get_modem(&self, modem_id: i32) -> StoreResult<Option<Modem>> {
        self.inner.get_modem(modem_id).await
    }

    async fn get_modem_by_imei(&self, imei: &str) -> StoreResult<Option<Modem>> {
        self.inner.get_modem_by_imei(imei).await
    }

    async fn get_sim_history(&self, modem_id: i32, limit: i64) -> StoreResult<Vec<Sim>> {
        self.inner.get_sim_history(modem_id, limit).await
    }

    async fn get_active_group(&self, group_id: i32) -> StoreResult<Option<Group>> {
        self.inner.get_active_group(group_id).await
    }

    async fn get_active_group_by_name(&self, group_name: &str) -> StoreResult<Option<Group>> {
        self.inner.get_active_group_by_name(group_name).await
    }

    async fn get_active_group_by_modem(&self, modem_id: i32) -> StoreResult<Option<Group>> {
        if self.stale.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_active_group_by_modem(modem_id).await
    }

    async fn insert_group(&self, group_name: &str, modem_id: i32) -> StoreResult<i32> {
        self.inner.insert_group(group_name, modem_id).await
    }

    async fn update_group_name(&self, group_id: i32, group_name: &str) -> StoreResult<bool> {
        self.inner.update_group_name(group_id, group_name).await
    }

    async fn update_group_modem(&self, group_id: i32, modem_id: i32) -> StoreResult<bool> {
        self.inner.update_group_modem(group_id, modem_id).await
    }

    async fn retire_group(&self, group_id: i32) -> StoreResult<bool> {
        self.inner.retire_group(group_id).await
    }

    async fn retire_orphaned_groups(&self) -> StoreResult<u64> {
        self.inner.retire_orphaned_groups().await
    }

    async fn list_active_groups_joined(&self) -> StoreResult<Vec<GroupDetails>> {
        self.inner.list_active_groups_joined().await
    }

    async fn find_active_groups_by_phone(
        &self,
        phone_number: &str,
    ) -> StoreResult<Vec<GroupDetails>> {
        self.inner.find_active_groups_by_phone(phone_number).await
    }

    async fn group_stats(&self) -> StoreResult<GroupStats> {
        self.inner.group_stats().await
    }

    async fn record_sim_swap(&self, record: &SimSwapRecord) -> StoreResult<()> {
        self.inner.record_sim_swap(record).await
    }
}
