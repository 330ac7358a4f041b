use std::{env, time::Duration};

use anyhow::{Context, Result};
use notifier_session::{ConnectionTarget, Notification, Session, SessionConfig, TIMEOUT_DEFAULT};
use tokio::{signal, sync::mpsc, time};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct DemoConfig {
    session: SessionConfig,
    wait_secs: u64,
}

impl DemoConfig {
    fn from_env() -> Result<Self> {
        let defaults = SessionConfig::default();

        let target = env::var("NOTIFIER_BUS")
            .ok()
            .map(|s| s.parse::<ConnectionTarget>())
            .transpose()
            .context("NOTIFIER_BUS must be 'session', 'system' or a D-Bus address")?
            .unwrap_or(defaults.target);
        let dbus_name = env::var("NOTIFIER_DBUS_NAME").unwrap_or(defaults.dbus_name);
        let dbus_path = env::var("NOTIFIER_DBUS_PATH").unwrap_or(defaults.dbus_path);

        let channel_capacity = env::var("NOTIFIER_CHANNEL_CAPACITY")
            .ok()
            .map(|s| s.parse::<usize>())
            .transpose()
            .context("NOTIFIER_CHANNEL_CAPACITY must be a valid usize")?
            .unwrap_or(defaults.channel_capacity);

        let wait_secs = env::var("NOTIFIER_DEMO_WAIT_SECS")
            .ok()
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("NOTIFIER_DEMO_WAIT_SECS must be a valid u64")?
            .unwrap_or(30);

        Ok(Self {
            session: SessionConfig {
                target,
                dbus_name,
                dbus_path,
                channel_capacity,
            },
            wait_secs,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("notifier_demo=info".parse()?))
        .init();

    let cfg = DemoConfig::from_env()?;
    let session = Session::connect(cfg.session.clone())
        .await
        .context("failed to start notification session")?;

    let capabilities = session.capabilities().await?;
    info!(
        bus = %cfg.session.target,
        dbus_name = %cfg.session.dbus_name,
        ?capabilities,
        "connected to notification daemon"
    );

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    let mut notification = Notification::new(
        "notifier-demo",
        "Floppy Disk Inserted",
        "A floppy disk has just been inserted into the machine.",
    );
    notification
        .set_icon("media-floppy")
        .set_timeout(TIMEOUT_DEFAULT)?
        .add_action_with_callback("view", "View", |id| info!(id, "view clicked"))?
        .add_action_with_callback("eject", "Eject", |id| info!(id, "eject clicked"))?
        .on_closed(move |id, reason| {
            info!(id, ?reason, "notification closed");
            let _ = closed_tx.send(id);
        });

    let id = session.send(&notification).await?;
    info!(id, wait_secs = cfg.wait_secs, "notification sent; press Ctrl+C to stop");

    tokio::select! {
        _ = signal::ctrl_c() => info!("received Ctrl+C; exiting"),
        _ = closed_rx.recv() => {}
        _ = time::sleep(Duration::from_secs(cfg.wait_secs)) => {
            warn!(id, "notification still open; closing it");
            session.close_notification(id).await?;
        }
    }

    session.close().await;
    Ok(())
}
