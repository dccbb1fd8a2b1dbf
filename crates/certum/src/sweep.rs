//! Timer-driven expiration sweep.
//!
//! The registry never expires anything on its own. This task plays the part
//! of the external automation: on every tick it scans one window of the
//! active index and commits whatever is due. The cursor walks the index
//! across ticks so an active set larger than one batch is still covered.

use certum_registry::{Registry, RegistryResult, SweepReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;

/// Position of the rolling sweep window in the active index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepCursor {
    offset: usize,
}

impl SweepCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Sweep one window and advance.
    pub fn tick(&mut self, registry: &Registry, max_batch: usize) -> RegistryResult<SweepReport> {
        let (report, next) = registry.scheduler().sweep_window(self.offset, max_batch)?;
        debug!(from = self.offset, next, "sweep window done");
        self.offset = next;
        Ok(report)
    }
}

/// Run the sweep forever on `config.interval_secs`.
pub async fn run_sweep_loop(registry: Arc<Registry>, config: SweepConfig) {
    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut cursor = SweepCursor::new();

    info!(
        interval_secs = config.interval_secs,
        max_batch = config.max_batch,
        "expiration sweep started"
    );

    loop {
        interval.tick().await;
        match cursor.tick(&registry, config.max_batch) {
            Ok(report) if report.is_empty() => {}
            Ok(report) => info!(
                committed = report.committed.len(),
                skipped = report.skipped.len(),
                "sweep tick"
            ),
            Err(e) => warn!(error = %e, "sweep tick failed"),
        }
    }
}

/// Spawn the sweep task if it is enabled.
pub fn spawn_sweep_task(registry: Arc<Registry>, config: &SweepConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("expiration sweep disabled");
        return None;
    }
    Some(tokio::spawn(run_sweep_loop(registry, config.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use certum_core::{Identity, ManualClock};
    use certum_registry::{AuditChain, MintRequest};

    const START: u64 = 1_700_000_000;

    fn who(c: char) -> Identity {
        Identity::parse(format!("0x{}", c.to_string().repeat(40))).unwrap()
    }

    fn registry_with(due: usize, live: usize) -> (Arc<Registry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let registry = Arc::new(Registry::new(
            who('a'),
            clock.clone(),
            Arc::new(AuditChain::new()),
        ));
        registry.register_issuer(&who('a'), &who('1'), "Acme").unwrap();
        let mint = |exp| {
            registry
                .mint(
                    &who('1'),
                    &MintRequest {
                        holder: who('b'),
                        content_uri: "ipfs://cert".into(),
                        content_hash: None,
                        expiration_timestamp: exp,
                    },
                )
                .unwrap();
        };
        for _ in 0..live {
            mint(0);
        }
        for _ in 0..due {
            mint(START + 1);
        }
        (registry, clock)
    }

    #[test]
    fn test_cursor_covers_active_set_larger_than_batch() {
        let (registry, clock) = registry_with(6, 6);
        clock.advance(1);

        let mut cursor = SweepCursor::new();
        let mut committed = 0;
        for _ in 0..12 {
            committed += cursor.tick(&registry, 4).unwrap().committed.len();
        }
        assert_eq!(committed, 6);
        assert_eq!(registry.active_count().unwrap(), 6);
    }

    #[test]
    fn test_cursor_wraps_to_start() {
        let (registry, _) = registry_with(0, 3);
        let mut cursor = SweepCursor::new();
        cursor.tick(&registry, 2).unwrap();
        assert_eq!(cursor.offset(), 2);
        cursor.tick(&registry, 2).unwrap();
        assert_eq!(cursor.offset(), 0);
    }

    #[tokio::test]
    async fn test_disabled_sweep_not_spawned() {
        let (registry, _) = registry_with(0, 0);
        let config = SweepConfig {
            enabled: false,
            ..SweepConfig::default()
        };
        assert!(spawn_sweep_task(registry, &config).is_none());
    }

    #[tokio::test]
    async fn test_sweep_task_expires_due_certificates() {
        let (registry, clock) = registry_with(3, 1);
        clock.advance(1);
        let config = SweepConfig {
            enabled: true,
            interval_secs: 1,
            max_batch: 10,
        };
        let handle = spawn_sweep_task(registry.clone(), &config).unwrap();

        // The first interval tick fires immediately.
        for _ in 0..100 {
            if registry.active_count().unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert_eq!(registry.active_count().unwrap(), 1);
    }
}
