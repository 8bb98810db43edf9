use crate::notification::Notifier;
use anyhow::Context;
use async_trait::async_trait;
use models::swap::SwapEvent;
use serde_json::{Value, json};
use std::time::Duration;

/// Posts SIM swap alerts to a Slack incoming webhook.
pub struct SlackNotifier {
    client: reqwest::Client,
    hook_url: String,
}

impl SlackNotifier {
    pub fn new(hook_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Slack client")?;

        Ok(Self {
            client,
            hook_url: hook_url.into(),
        })
    }
}

fn swap_message(event: &SwapEvent) -> Value {
    json!({
        "text": format!(
            ":warning: SIM swap on group *{}* (IMEI `{}`)\n\
             Old number: {} (balance {} DA)\n\
             New number: {} (balance {} DA)",
            event.group_name,
            event.imei,
            event.old_sim_number,
            event.old_balance,
            event.new_sim_number,
            event.new_balance,
        )
    })
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_sim_swap(&self, event: &SwapEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.hook_url)
            .header("Content-Type", "application/json")
            .json(&swap_message(event))
            .send()
            .await
            .context("failed to reach Slack")?
            .error_for_status()
            .context("Slack rejected the notification")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_swap_message_mentions_both_numbers() {
        let event = SwapEvent {
            group_name: "GROUP_643809".into(),
            imei: "356938035643809".into(),
            old_sim_number: "0550000001".into(),
            new_sim_number: "0660000002".into(),
            old_balance: Decimal::new(1050, 2),
            new_balance: Decimal::ZERO,
        };

        let text = swap_message(&event)["text"].as_str().unwrap().to_string();
        assert!(text.contains("GROUP_643809"));
        assert!(text.contains("0550000001 (balance 10.50 DA)"));
        assert!(text.contains("0660000002 (balance 0 DA)"));
    }
}
