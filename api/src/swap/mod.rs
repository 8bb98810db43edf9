use crate::notification::NotificationDispatcher;
use crate::store::Store;
use chrono::Utc;
use models::group::Group;
use models::sim::Sim;
use models::swap::{SimSwapRecord, SwapEvent};
use std::sync::Arc;
use tracing::{error, info};

const SWAP_HISTORY_DEPTH: i64 = 2;

/// Infers SIM swaps by diffing the two most recent SIM rows of a modem.
///
/// Extraction can race with registration, so the committed history is the
/// only signal compared here; nothing is read from the device itself.
#[derive(Clone)]
pub struct SwapDetector {
    store: Arc<dyn Store>,
    dispatcher: NotificationDispatcher,
}

impl SwapDetector {
    pub fn new(store: Arc<dyn Store>, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Returns the swap that was detected and dispatched, if any.
    #[tracing::instrument(skip(self, group), fields(group_id = group.id))]
    pub async fn handle_potential_swap(
        &self,
        modem_id: i32,
        imei: &str,
        group: &Group,
    ) -> Option<SwapEvent> {
        let history = match self.store.get_sim_history(modem_id, SWAP_HISTORY_DEPTH).await {
            Ok(history) => history,
            Err(err) => {
                error!("Failed to read SIM history for modem {modem_id} (IMEI {imei}): {err}");
                return None;
            }
        };

        let [current, previous, ..] = history.as_slice() else {
            return None;
        };

        let event = detect_swap(previous, current, &group.group_name, imei)?;

        info!(
            "SIM swap detected for IMEI {imei}: {} -> {}, group '{}' kept",
            event.old_sim_number, event.new_sim_number, group.group_name
        );

        let record = SimSwapRecord {
            group_id: group.id,
            modem_id,
            old_phone: event.old_sim_number.clone(),
            new_phone: event.new_sim_number.clone(),
            swapped_at: Utc::now(),
        };
        if let Err(err) = self.store.record_sim_swap(&record).await {
            error!("Failed to record SIM swap for group {} (modem {modem_id}): {err}", group.id);
        }

        self.dispatcher.notify(event.clone());
        Some(event)
    }
}

/// Both numbers must be present and differ; anything ambiguous is not a swap.
fn detect_swap(previous: &Sim, current: &Sim, group_name: &str, imei: &str) -> Option<SwapEvent> {
    let old_number = previous.known_phone_number()?;
    let new_number = current.known_phone_number()?;
    if old_number == new_number {
        return None;
    }

    Some(SwapEvent {
        group_name: group_name.to_string(),
        imei: imei.to_string(),
        old_sim_number: old_number.to_string(),
        new_sim_number: new_number.to_string(),
        old_balance: previous.balance.unwrap_or_default(),
        new_balance: current.balance.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    struct Fixture {
        store: Arc<MemoryStore>,
        detector: SwapDetector,
        modem_id: i32,
        group: Group,
    }

    const IMEI: &str = "356938035643809";

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let modem_id = store.add_modem(IMEI);
        let group_id = store.insert_group("GROUP_643809", modem_id).await.unwrap();
        let group = store.get_active_group(group_id).await.unwrap().unwrap();
        let dispatcher = NotificationDispatcher::new(None, 8);
        let detector = SwapDetector::new(store.clone(), dispatcher);
        Fixture {
            store,
            detector,
            modem_id,
            group,
        }
    }

    #[tokio::test]
    async fn test_differing_numbers_are_a_swap() {
        let f = fixture().await;
        let t1 = Utc::now();
        f.store.add_sim_at(f.modem_id, Some("A"), Some("10.50"), t1);
        f.store.add_sim_at(f.modem_id, Some("B"), Some("200"), t1 + Duration::seconds(30));

        let event = f
            .detector
            .handle_potential_swap(f.modem_id, IMEI, &f.group)
            .await
            .unwrap();
        assert_eq!(event.old_sim_number, "A");
        assert_eq!(event.new_sim_number, "B");
        assert_eq!(event.old_balance, Decimal::from_str("10.50").unwrap());
        assert_eq!(event.new_balance, Decimal::from(200));
        assert_eq!(event.group_name, "GROUP_643809");

        let swaps = f.store.sim_swaps();
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].group_id, f.group.id);
    }

    #[tokio::test]
    async fn test_single_row_is_not_a_swap() {
        let f = fixture().await;
        f.store.add_sim(f.modem_id, Some("A"), None);

        assert!(f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await.is_none());
        assert!(f.store.sim_swaps().is_empty());
    }

    #[tokio::test]
    async fn test_identical_numbers_are_not_a_swap() {
        let f = fixture().await;
        let t1 = Utc::now();
        f.store.add_sim_at(f.modem_id, Some("A"), Some("10"), t1);
        f.store.add_sim_at(f.modem_id, Some("A"), Some("5"), t1 + Duration::seconds(30));

        assert!(f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_number_is_not_a_swap() {
        let f = fixture().await;
        let t1 = Utc::now();
        f.store.add_sim_at(f.modem_id, Some("A"), None, t1);
        f.store.add_sim_at(f.modem_id, Some(""), None, t1 + Duration::seconds(30));
        assert!(f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await.is_none());

        f.store.add_sim_at(f.modem_id, None, None, t1 + Duration::seconds(60));
        assert!(f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await.is_none());
    }

    #[tokio::test]
    async fn test_only_two_most_recent_rows_are_compared() {
        let f = fixture().await;
        let t1 = Utc::now();
        f.store.add_sim_at(f.modem_id, Some("A"), None, t1);
        f.store.add_sim_at(f.modem_id, Some("B"), None, t1 + Duration::seconds(30));
        f.store.add_sim_at(f.modem_id, Some("B"), None, t1 + Duration::seconds(60));

        assert!(f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await.is_none());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_suppress_swap() {
        let f = fixture().await;
        let t1 = Utc::now();
        f.store.add_sim_at(f.modem_id, Some("A"), None, t1);
        f.store.add_sim_at(f.modem_id, Some("B"), None, t1 + Duration::seconds(30));
        f.store.set_failing_audit(true);

        let event = f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await;
        assert!(event.is_some());
        assert!(f.store.sim_swaps().is_empty());
    }

    #[tokio::test]
    async fn test_history_read_failure_is_not_a_swap() {
        let f = fixture().await;
        f.store.set_failing(true);
        assert!(f.detector.handle_potential_swap(f.modem_id, IMEI, &f.group).await.is_none());
    }
}
