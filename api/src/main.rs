use simpulse::config::Config;
use simpulse::group::GroupLifecycle;
use simpulse::notification::{NotificationDispatcher, Notifier};
use simpulse::recharge::RechargeVerifier;
use simpulse::slack::SlackNotifier;
use simpulse::store::{PgStore, Store};
use simpulse::{State, app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() {
    let config: &'static Config = Box::leak(Box::new(
        Config::new().expect("error: failed to construct config"),
    ));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("error: failed to initialize tokio runtime")
        .block_on(async {
            if let Err(err) = start_main_server(config).await {
                error!("SimPulse API stopped: {err:#}");
                std::process::exit(1);
            }
        });
}

async fn start_main_server(config: &'static Config) -> anyhow::Result<()> {
    info!("Starting SimPulse API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&config.database_url).await?);

    let notifier: Option<Arc<dyn Notifier>> = match &config.slack_hook_url {
        Some(url) => Some(Arc::new(SlackNotifier::new(url)?)),
        None => {
            warn!("SLACK_HOOK_URL not set, SIM swap notifications will be dropped");
            None
        }
    };
    let dispatcher = NotificationDispatcher::new(notifier, config.notification_queue_capacity);

    let groups = Arc::new(GroupLifecycle::new(
        store.clone(),
        dispatcher,
        config.group_prefix.clone(),
    ));
    if !config.group_auto_create {
        groups.disable_auto_create();
    }

    if let Some(period) = config.orphan_cleanup_interval {
        let groups = groups.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let retired = groups.cleanup_orphaned_groups().await;
                if retired > 0 {
                    info!("Periodic cleanup retired {retired} orphaned groups");
                }
            }
        });
    }

    let state = State {
        groups,
        store,
        recharge: Arc::new(RechargeVerifier::new(config.recharge_margin_minutes)),
    };

    let listener = TcpListener::bind(config.bind_address.as_str()).await?;
    info!(
        "SimPulse API running on http://{} (Press Ctrl+C to quit)",
        listener.local_addr()?
    );
    axum::serve(listener, app(state)).await?;
    Ok(())
}
