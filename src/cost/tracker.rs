use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::model::{CostSummary, UsageDraft, UsageRecord};
use crate::config::ConfigStore;

enum LedgerMsg {
    Record(UsageDraft),
    /// Acked once every previously sent record is appended.
    Flush(oneshot::Sender<()>),
}

/// Append-only usage ledger.
///
/// `record` pushes onto an unbounded channel and returns immediately; a
/// single writer task owns all appends, so the request path never contends
/// on the ledger lock. A record that cannot be enqueued is counted as an
/// anomaly and dropped, never surfaced to the caller.
#[derive(Clone)]
pub struct CostTracker {
    tx: mpsc::UnboundedSender<LedgerMsg>,
    records: Arc<RwLock<Vec<UsageRecord>>>,
    anomalies: Arc<AtomicU64>,
}

impl CostTracker {
    /// Creates the ledger and spawns its writer task. The task exits when
    /// the last tracker handle is dropped.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let records = Arc::new(RwLock::new(Vec::new()));
        let anomalies = Arc::new(AtomicU64::new(0));

        tokio::spawn(writer_loop(rx, Arc::clone(&records)));

        Self {
            tx,
            records,
            anomalies,
        }
    }

    /// Enqueues one usage event. Non-blocking; a send failure is logged and
    /// counted, not returned.
    pub fn record(&self, draft: UsageDraft) {
        if self.tx.send(LedgerMsg::Record(draft)).is_err() {
            self.anomalies.fetch_add(1, Ordering::Relaxed);
            warn!("ledger writer gone, usage record dropped");
        }
    }

    /// Waits until every record enqueued before this call is appended.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(LedgerMsg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Summarizes the ledger over the trailing `window`.
    pub fn summarize(&self, window: Duration) -> CostSummary {
        let cutoff = TimeDelta::from_std(window)
            .ok()
            .and_then(|delta| Utc::now().checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let records = self.records.read();
        let in_window: Vec<UsageRecord> = records
            .iter()
            .filter(|r| r.recorded_at >= cutoff)
            .cloned()
            .collect();

        CostSummary::from_records(&in_window, window.as_secs())
    }

    /// Records dropped because the writer was unreachable.
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }

    /// Number of resident ledger rows.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drops rows recorded before `cutoff`. Returns the number removed.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.recorded_at >= cutoff);
        let removed = before - records.len();
        if removed > 0 {
            debug!(removed, "purged expired usage records");
        }
        removed
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("records", &self.records.read().len())
            .field("anomalies", &self.anomalies.load(Ordering::Relaxed))
            .finish()
    }
}

async fn writer_loop(
    mut rx: mpsc::UnboundedReceiver<LedgerMsg>,
    records: Arc<RwLock<Vec<UsageRecord>>>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            LedgerMsg::Record(draft) => {
                records.write().push(draft.into_record(Utc::now()));
            }
            LedgerMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// Spawns the retention purger. Interval and retention are re-read from the
/// config store on every tick.
pub fn start_purger(
    tracker: CostTracker,
    config: Arc<ConfigStore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let cost = config.snapshot().cost.clone();
            tokio::time::sleep(Duration::from_secs(cost.purge_interval_secs)).await;

            let cutoff = Utc::now() - TimeDelta::days(cost.retention_days as i64);
            let removed = tracker.purge_older_than(cutoff);
            if removed > 0 {
                info!(removed, retention_days = cost.retention_days, "ledger retention purge");
            }
        }
    })
}
