use async_trait::async_trait;
use models::swap::SwapEvent;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use worker::{Delivery, DeliveryWorker};

mod worker;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Operator-facing channel told about SIM swaps.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_sim_swap(&self, event: &SwapEvent) -> anyhow::Result<()>;
}

/// Hands swap events to a background worker without waiting for delivery.
///
/// Delivery is best-effort: one attempt per event, no retries, and events
/// still queued when the process stops are lost.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<RwLock<Option<Arc<dyn Notifier>>>>,
    sender: mpsc::Sender<Delivery>,
}

impl NotificationDispatcher {
    /// Spawns the delivery worker, so this must be called inside a tokio runtime.
    pub fn new(notifier: Option<Arc<dyn Notifier>>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mut worker = DeliveryWorker::new(receiver);
        tokio::spawn(async move { worker.run().await });

        Self {
            notifier: Arc::new(RwLock::new(notifier)),
            sender,
        }
    }

    /// Replaces the current notifier. The last registration wins.
    pub fn register_notifier(&self, notifier: Arc<dyn Notifier>) {
        let mut current = self.notifier.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(notifier);
    }

    #[cfg(test)]
    fn has_notifier(&self) -> bool {
        self.notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn notify(&self, event: SwapEvent) {
        let notifier = self
            .notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(notifier) = notifier else {
            warn!(
                "No notifier registered, dropping SIM swap notification for group {} (IMEI {})",
                event.group_name, event.imei
            );
            return;
        };

        match self.sender.try_send(Delivery { notifier, event }) {
            Ok(()) => {}
            Err(TrySendError::Full(delivery)) => warn!(
                "Notification queue full, dropping SIM swap notification for group {}",
                delivery.event.group_name
            ),
            Err(TrySendError::Closed(delivery)) => warn!(
                "Notification worker stopped, dropping SIM swap notification for group {}",
                delivery.event.group_name
            ),
        }
    }
}
