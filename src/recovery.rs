//! Timeout recovery for processes abandoned mid-flight.
//!
//! A crashed worker leaves its process without a terminal event forever. The
//! sweep finds such processes, and once one has sat idle past the configured
//! threshold since its latest start-like event, force-closes it by appending
//! a synthetic failure with `error_type = "timeout"`. The sweep only ever
//! appends; it never edits history.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::collaborators::Clock;
use crate::config::RecoveryConfig;
use crate::error::Result;
use crate::events::{Criteria, DomainEvent, EventKind, EventStore, RepositoryConnectionFailed};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Processes examined (all that ever connected a repository).
    pub scanned: usize,
    /// Processes force-closed with a synthetic timeout failure.
    pub recovered: usize,
}

/// Periodic sweep over the ledger that closes stale processes.
pub struct RecoverySweep {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
}

impl RecoverySweep {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: &RecoveryConfig) -> Self {
        Self {
            store,
            clock,
            stale_after: config.stale_after,
        }
    }

    /// Run one pass over every known process.
    ///
    /// Failures on a single process are logged and skipped so one bad stream
    /// cannot starve the rest of the sweep.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SweepReport> {
        let connected = self
            .store
            .find(&Criteria::new(), EventKind::RepositoryConnected)
            .await?;

        // A process can reconnect; dedupe before walking histories.
        let process_ids: BTreeSet<String> = connected
            .iter()
            .map(|event| event.process_id().to_string())
            .collect();

        let now = self.clock.now();
        let mut recovered = 0;
        for process_id in &process_ids {
            match self.recover_if_stale(process_id, now).await {
                Ok(true) => recovered += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!(process_id, %error, "sweep skipped process");
                }
            }
        }

        let report = SweepReport {
            scanned: process_ids.len(),
            recovered,
        };
        info!(scanned = report.scanned, recovered = report.recovered, "recovery sweep finished");
        Ok(report)
    }

    async fn recover_if_stale(&self, process_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let history = self.store.get(process_id).await?;

        let Some(last) = history.last() else {
            return Ok(false);
        };
        if last.is_terminal() {
            return Ok(false);
        }

        // Idle time is measured from the latest start-like event, not the
        // latest event overall: progress events do not reset the clock.
        let Some(started_at) = history
            .iter()
            .filter(|event| event.is_start_like())
            .map(DomainEvent::occurred_at)
            .max()
        else {
            return Ok(false);
        };

        let idle = now.signed_duration_since(started_at);
        let threshold =
            chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::MAX);
        if idle <= threshold {
            return Ok(false);
        }

        let failure = DomainEvent::RepositoryConnectionFailed(RepositoryConnectionFailed {
            process_id: process_id.to_string(),
            occurred_at: now,
            error_type: "timeout".to_string(),
            message: format!(
                "process idle for {}s without reaching a terminal state",
                idle.num_seconds()
            ),
        });
        self.store.append(process_id, &[failure]).await?;
        counter!("chronicle_processes_recovered_total").increment(1);
        info!(process_id, idle_seconds = idle.num_seconds(), "stale process force-closed");
        Ok(true)
    }
}
