//! Background maintenance: expired entry sweeps and security scans.
//!
//! Each job runs in its own tokio task on a fixed-rate interval. The first
//! run happens one full period after spawning. All tasks share one
//! [`CancellationToken`] owned by the [`MaintenanceHandle`].

use std::sync::Arc;
use std::time::Duration;

use stratum_cache::TieredCache;
use stratum_session::SessionRegistry;
use stratum_types::HasMaintenanceConfig;
use stratum_types::config::defaults;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Sweep intervals of the maintenance jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSchedule {
    /// Whether [`crate::Stratum::start_maintenance`] spawns anything.
    pub enabled: bool,
    pub cache_cleanup: Duration,
    pub session_cleanup: Duration,
    pub security_scan: Duration,
}

impl MaintenanceSchedule {
    pub fn from_provider<C: HasMaintenanceConfig>(provider: &C) -> Self {
        Self {
            enabled: provider.maintenance_enabled(),
            cache_cleanup: provider.cache_cleanup_interval(),
            session_cleanup: provider.session_cleanup_interval(),
            security_scan: provider.security_scan_interval(),
        }
    }

    /// Same interval for every job. Mostly useful in tests.
    pub fn uniform(period: Duration) -> Self {
        Self {
            enabled: true,
            cache_cleanup: period,
            session_cleanup: period,
            security_scan: period,
        }
    }
}

impl Default for MaintenanceSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_cleanup: defaults::cache_cleanup_interval(),
            session_cleanup: defaults::session_cleanup_interval(),
            security_scan: defaults::security_scan_interval(),
        }
    }
}

/// Owner of the running maintenance tasks.
///
/// Dropping the handle cancels the tasks without waiting for them; call
/// [`shutdown`](Self::shutdown) to also join them.
#[derive(Debug)]
pub struct MaintenanceHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Spawn the cache sweep, session sweep and security scan tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        cache: TieredCache,
        sessions: Arc<SessionRegistry>,
        schedule: &MaintenanceSchedule,
    ) -> Self {
        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        tasks.push(spawn_periodic(
            "cache_cleanup",
            schedule.cache_cleanup,
            token.clone(),
            move || {
                cache.cleanup_expired();
            },
        ));

        let registry = Arc::clone(&sessions);
        tasks.push(spawn_periodic(
            "session_cleanup",
            schedule.session_cleanup,
            token.clone(),
            move || {
                registry.cleanup_expired();
            },
        ));

        tasks.push(spawn_periodic(
            "security_scan",
            schedule.security_scan,
            token.clone(),
            move || {
                let anomalies = sessions.security_scan();
                if !anomalies.is_empty() {
                    debug!(count = anomalies.len(), "Security scan found anomalies");
                }
            },
        ));

        debug!(
            cache_cleanup_secs = schedule.cache_cleanup.as_secs(),
            session_cleanup_secs = schedule.session_cleanup.as_secs(),
            security_scan_secs = schedule.security_scan.as_secs(),
            "Maintenance started"
        );

        Self { token, tasks }
    }

    /// Token cancelling every maintenance task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// True while at least one task is still running.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Maintenance task ended abnormally");
            }
        }
        debug!("Maintenance stopped");
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn spawn_periodic<F>(
    job: &'static str,
    period: Duration,
    token: CancellationToken,
    mut run: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(job, "Maintenance task cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    trace!(job, "Maintenance tick");
                    run();
                }
            }
        }
    })
}
