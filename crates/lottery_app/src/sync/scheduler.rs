use lottery_lib::client::LedgerReader;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinHandle, JoinSet},
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use super::reconciler::Reconciler;

pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug)]
enum Trigger {
    Scheduled,
    Manual,
}

/// Running poll loop. Dropping the handle aborts the loop; `stop` also waits
/// for in-flight reconciles to be cancelled.
pub struct PollerHandle {
    refresh_tx: mpsc::Sender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Request an out-of-band reconcile. It runs alongside the periodic one
    /// and leaves the schedule untouched. Returns `false` when the poller has
    /// stopped or a refresh is already queued.
    pub fn refresh(&self) -> bool {
        self.refresh_tx.try_send(()).is_ok()
    }

    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Reconcile once right away, then every `period` until stopped.
pub fn start<R>(reconciler: Arc<Reconciler<R>>, period: Duration) -> PollerHandle
where
    R: LedgerReader + ?Sized + 'static,
{
    let (refresh_tx, refresh_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run(reconciler, period, refresh_rx, shutdown_rx));

    PollerHandle {
        refresh_tx,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

async fn run<R>(
    reconciler: Arc<Reconciler<R>>,
    period: Duration,
    mut refresh_rx: mpsc::Receiver<()>,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    R: LedgerReader + ?Sized + 'static,
{
    let mut ticker = interval_at(Instant::now(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();
    info!(period_secs = period.as_secs_f64(), "round poller started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                in_flight.spawn(reconcile_once(reconciler.clone(), Trigger::Scheduled));
            }
            Some(()) = refresh_rx.recv() => {
                in_flight.spawn(reconcile_once(reconciler.clone(), Trigger::Manual));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!(error = %err, "reconcile task panicked");
                    }
                }
            }
        }
    }

    in_flight.shutdown().await;
    info!("round poller stopped");
}

async fn reconcile_once<R>(reconciler: Arc<Reconciler<R>>, trigger: Trigger)
where
    R: LedgerReader + ?Sized,
{
    match reconciler.reconcile().await {
        Ok(Some(snapshot)) => debug!(
            ?trigger,
            round_id = snapshot.round_id,
            pot = %snapshot.pot,
            players = snapshot.ticket_count(),
            active = snapshot.is_active,
            "round reconciled"
        ),
        Ok(None) => debug!(?trigger, "no active round"),
        Err(err) if err.is_malformed() => {
            error!(?trigger, error = %err, "malformed round data")
        }
        Err(err) => warn!(?trigger, error = %err, "round reconcile failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::reconciler::RoundView;
    use alloy_primitives::{Address, U256};
    use lottery_lib::client::mock::{Fault, MockLedger};

    const TICK: Duration = Duration::from_millis(1);

    fn setup() -> (Arc<MockLedger>, Arc<Reconciler<MockLedger>>) {
        let ledger = Arc::new(MockLedger::new(Address::repeat_byte(0xaa)));
        ledger.open_round(U256::from(1u64), 100);
        let reconciler = Arc::new(Reconciler::new(ledger.clone()));
        (ledger, reconciler)
    }

    #[tokio::test(start_paused = true)]
    async fn reconciles_immediately_then_on_period() {
        let (ledger, reconciler) = setup();
        let handle = start(reconciler.clone(), DEFAULT_POLL_PERIOD);

        tokio::time::sleep(TICK).await;
        assert_eq!(ledger.round_id_reads(), 1);
        assert!(matches!(reconciler.view(), RoundView::Live(_)));

        tokio::time::sleep(DEFAULT_POLL_PERIOD).await;
        assert_eq!(ledger.round_id_reads(), 2);
        tokio::time::sleep(DEFAULT_POLL_PERIOD).await;
        assert_eq!(ledger.round_id_reads(), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_runs_after_stop() {
        let (ledger, reconciler) = setup();
        let handle = start(reconciler, DEFAULT_POLL_PERIOD);
        tokio::time::sleep(TICK).await;

        handle.stop().await;
        let reads = ledger.round_id_reads();
        tokio::time::sleep(DEFAULT_POLL_PERIOD * 5).await;
        assert_eq!(ledger.round_id_reads(), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_keeps_the_schedule() {
        let (ledger, reconciler) = setup();
        let handle = start(reconciler, DEFAULT_POLL_PERIOD);
        tokio::time::sleep(TICK).await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(handle.refresh());
        tokio::time::sleep(TICK).await;
        assert_eq!(ledger.round_id_reads(), 2);

        // The periodic tick still lands at t = 10s.
        tokio::time::sleep(Duration::from_secs(6) - TICK * 3).await;
        assert_eq!(ledger.round_id_reads(), 2);
        tokio::time::sleep(TICK * 2).await;
        assert_eq!(ledger.round_id_reads(), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_loop() {
        let (ledger, reconciler) = setup();
        ledger.inject_read_faults(Fault::Timeout, 2);
        let handle = start(reconciler.clone(), DEFAULT_POLL_PERIOD);

        tokio::time::sleep(TICK).await;
        assert!(matches!(reconciler.view(), RoundView::Unavailable { .. }));

        tokio::time::sleep(DEFAULT_POLL_PERIOD).await;
        assert!(matches!(reconciler.view(), RoundView::Unavailable { .. }));

        tokio::time::sleep(DEFAULT_POLL_PERIOD).await;
        assert!(matches!(reconciler.view(), RoundView::Live(_)));
        handle.stop().await;
    }
}
