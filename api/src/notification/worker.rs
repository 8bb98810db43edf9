use super::Notifier;
use models::swap::SwapEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct Delivery {
    pub notifier: Arc<dyn Notifier>,
    pub event: SwapEvent,
}

/// Delivers swap notifications one at a time. Each delivery is attempted
/// once; failures and panics are logged and dropped.
pub struct DeliveryWorker {
    receiver: mpsc::Receiver<Delivery>,
}

impl DeliveryWorker {
    pub fn new(receiver: mpsc::Receiver<Delivery>) -> Self {
        Self { receiver }
    }

    /// Runs the notifier on its own task so a panicking notifier only loses
    /// the event at hand.
    async fn deliver(&self, delivery: Delivery) {
        let Delivery { notifier, event } = delivery;
        let group_name = event.group_name.clone();
        let imei = event.imei.clone();

        let attempt = tokio::spawn(async move { notifier.notify_sim_swap(&event).await });
        match attempt.await {
            Ok(Ok(())) => info!("Delivered SIM swap notification for group {group_name} (IMEI {imei})"),
            Ok(Err(err)) => error!(
                "Failed to deliver SIM swap notification for group {group_name} (IMEI {imei}): {err:#}"
            ),
            Err(err) if err.is_panic() => error!(
                "Notifier panicked while delivering SIM swap notification for group {group_name} (IMEI {imei})"
            ),
            Err(err) => error!(
                "SIM swap notification for group {group_name} (IMEI {imei}) was cancelled: {err}"
            ),
        }
    }

    pub async fn run(&mut self) {
        info!("Notification worker starting");
        while let Some(delivery) = self.receiver.recv().await {
            self.deliver(delivery).await;
        }
        info!("Notification worker shutting down");
    }
}
