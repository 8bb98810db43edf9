use crate::store::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};

pub const DEFAULT_GROUP_PREFIX: &str = "GROUP_";

const IMEI_SUFFIX_LEN: usize = 6;
const MAX_NAME_COLLISIONS: u32 = 100;

/// Derives human-readable group labels from a modem's IMEI.
#[derive(Clone)]
pub struct GroupNamer {
    store: Arc<dyn Store>,
    prefix: String,
}

impl GroupNamer {
    pub fn new(store: Arc<dyn Store>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// `<prefix><last 6 chars of imei>`, suffixed with `_1`, `_2`, ... while
    /// the name is held by an active group. After 100 collisions (the base
    /// name plus `_1` to `_99`) falls back to a timestamped name.
    pub async fn generate(&self, imei: &str) -> String {
        let base_name = format!("{}{}", self.prefix, imei_suffix(imei));
        let mut candidate = base_name.clone();
        let mut collisions = 0;

        loop {
            match self.store.get_active_group_by_name(&candidate).await {
                Ok(None) => return candidate,
                Ok(Some(_)) => {
                    collisions += 1;
                    if collisions >= MAX_NAME_COLLISIONS {
                        warn!(
                            "Group name {base_name} collided {MAX_NAME_COLLISIONS} times, using timestamp name"
                        );
                        return self.timestamp_name(Utc::now()).await;
                    }
                    candidate = format!("{base_name}_{collisions}");
                }
                Err(err) => {
                    error!("Failed to check group name {candidate} for IMEI {imei}: {err}");
                    return self.timestamp_name(Utc::now()).await;
                }
            }
        }
    }

    /// `<prefix><%Y%m%d_%H%M%S>`, suffixed with `_1`, `_2`, ... when fallbacks
    /// land in the same second. Microseconds break the tie once those run out.
    async fn timestamp_name(&self, now: DateTime<Utc>) -> String {
        let base_name = format!("{}{}", self.prefix, now.format("%Y%m%d_%H%M%S"));
        let mut candidate = base_name.clone();

        for n in 1..=MAX_NAME_COLLISIONS {
            match self.store.get_active_group_by_name(&candidate).await {
                Ok(None) => return candidate,
                Ok(Some(_)) => candidate = format!("{base_name}_{n}"),
                Err(err) => {
                    error!("Failed to check timestamp group name {candidate}: {err}");
                    return candidate;
                }
            }
        }

        format!("{base_name}_{}", now.format("%6f"))
    }
}

fn imei_suffix(imei: &str) -> &str {
    let chars = imei.chars().count();
    if chars <= IMEI_SUFFIX_LEN {
        return imei;
    }
    let start = imei
        .char_indices()
        .nth(chars - IMEI_SUFFIX_LEN)
        .map(|(index, _)| index)
        .unwrap_or(0);
    &imei[start..]
}
