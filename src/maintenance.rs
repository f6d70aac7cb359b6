//! Background runtime maintenance loop.
//!
//! Runs periodic cache expiry sweeps, stale-session cleanup, and snapshot
//! pruning while the server is up.

use crate::events::ForageEvent;
use crate::service::AcquisitionService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const DEFAULT_TICK_SECS: u64 = 300;

/// Sessions live longer than this are assumed stuck and failed out.
const STALE_SESSION_MAX_AGE: Duration = Duration::from_secs(600);

/// Spawn the maintenance loop; it runs until `shutdown` is notified.
pub fn spawn(
    service: Arc<AcquisitionService>,
    shutdown: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    let tick_every = Duration::from_secs(
        read_env_u64("FORAGE_MAINTENANCE_TICK_SECS", DEFAULT_TICK_SECS).max(1),
    );

    tokio::spawn(async move {
        tracing::info!(
            "maintenance loop started: tick={}s",
            tick_every.as_secs()
        );
        let mut ticker = tokio::time::interval(tick_every);
        // The first interval tick fires immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("maintenance loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    run_tick(&service);
                }
            }
        }
    })
}

fn run_tick(service: &AcquisitionService) {
    let expired_removed = service.cleanup_cache();
    if expired_removed > 0 {
        tracing::info!("maintenance removed {expired_removed} expired cache entr(ies)");
    }

    let stale = service.tracker().sweep_stale(STALE_SESSION_MAX_AGE);
    if stale > 0 {
        tracing::warn!("maintenance failed {stale} stale session(s)");
    }

    let snapshots_pruned = service
        .snapshots()
        .map(|store| store.prune())
        .unwrap_or(0);

    service.events().emit(ForageEvent::MaintenanceTick {
        cache_entries: service.cache_size(),
        expired_removed,
        snapshots_pruned,
    });
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
}
