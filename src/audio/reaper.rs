use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::audio::coordinator::{PlaybackCoordinator, ReapOutcome};

/// Periodic sweep that disconnects guilds idle past `idle_timeout`.
///
/// The reaper only asks; each guild decides inside its own actor whether it
/// is really idle, so a reap can't race a concurrent enqueue or skip.
pub struct IdleReaper {
    coordinator: PlaybackCoordinator,
    period: Duration,
    idle_timeout: Duration,
}

/// Per-sweep tally, mostly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub disconnected: usize,
    pub pruned: usize,
}

impl IdleReaper {
    pub fn new(coordinator: PlaybackCoordinator, period: Duration, idle_timeout: Duration) -> Self {
        Self {
            coordinator,
            period,
            idle_timeout,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!(
            "💤 Idle reaper running every {}s (timeout {}s)",
            self.period.as_secs(),
            self.idle_timeout.as_secs()
        );

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be idle yet.
        interval.tick().await;

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// One pass over every known guild.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for guild_id in self.coordinator.guild_ids() {
            report.checked += 1;
            match self
                .coordinator
                .reap_if_idle(guild_id, self.idle_timeout)
                .await
            {
                ReapOutcome::Kept => {}
                ReapOutcome::Disconnected => report.disconnected += 1,
                ReapOutcome::Pruned => report.pruned += 1,
            }
        }

        if report.disconnected > 0 || report.pruned > 0 {
            info!(
                "🧹 Idle sweep: {} disconnected, {} pruned of {} guilds",
                report.disconnected, report.pruned, report.checked
            );
        } else {
            debug!("Idle sweep checked {} guilds", report.checked);
        }
        report
    }
}
