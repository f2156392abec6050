use lottery_lib::{client::LedgerReader, types::RoundSnapshot, LedgerError};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What the client currently knows about the running round.
#[derive(Clone, Debug)]
pub enum RoundView {
    /// Nothing fetched yet.
    Loading,
    /// The contract reports round id 0.
    NoActiveRound,
    Live(Arc<RoundSnapshot>),
    /// Last good snapshot, kept after a failed refresh.
    Stale {
        snapshot: Arc<RoundSnapshot>,
        error: String,
    },
    /// A refresh failed and there is no earlier snapshot to fall back on.
    Unavailable { error: String },
}

impl RoundView {
    pub fn snapshot(&self) -> Option<&Arc<RoundSnapshot>> {
        match self {
            RoundView::Live(snapshot) | RoundView::Stale { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, RoundView::Stale { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("node reported round {seen} after round {held} was already observed")]
    Regressed { held: u64, seen: u64 },
}

impl ReconcileError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ReconcileError::Ledger(e) if e.is_malformed())
    }
}

/// Owns the published [`RoundView`] and replaces it wholesale on every
/// accepted fetch.
///
/// Each `reconcile` call takes a sequence number when it starts. A result is
/// committed only if no later-started call has committed first, so a slow
/// refresh cannot overwrite fresher data.
///
/// The highest round id ever accepted is remembered across `NoActiveRound`,
/// so a lagging node cannot walk the view back to an older round.
pub struct Reconciler<R: ?Sized> {
    reader: Arc<R>,
    view_tx: watch::Sender<RoundView>,
    started: AtomicU64,
    committed: AtomicU64,
    highest_round: AtomicU64,
}

impl<R: LedgerReader + ?Sized> Reconciler<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let (view_tx, _) = watch::channel(RoundView::Loading);
        Self {
            reader,
            view_tx,
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            highest_round: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RoundView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> RoundView {
        self.view_tx.borrow().clone()
    }

    pub async fn reconcile(&self) -> Result<Option<Arc<RoundSnapshot>>, ReconcileError> {
        let seq = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = self.fetch().await;
        self.commit(seq, fetched)
    }

    async fn fetch(&self) -> Result<Option<Arc<RoundSnapshot>>, LedgerError> {
        let round_id = self.reader.current_round_id().await?;
        if round_id == 0 {
            return Ok(None);
        }

        let raw = self.reader.round_info(round_id).await?;
        let snapshot = RoundSnapshot::from_raw(round_id, raw)?;
        if !snapshot.pot_matches_tickets() {
            debug!(
                round_id,
                pot = %snapshot.pot,
                tickets = snapshot.ticket_count(),
                "pot differs from ticket_price * tickets"
            );
        }
        Ok(Some(Arc::new(snapshot)))
    }

    fn commit(
        &self,
        seq: u64,
        fetched: Result<Option<Arc<RoundSnapshot>>, LedgerError>,
    ) -> Result<Option<Arc<RoundSnapshot>>, ReconcileError> {
        let mut outcome: Option<Result<Option<Arc<RoundSnapshot>>, ReconcileError>> = None;

        // The closure runs under the channel's write lock, which serialises
        // the sequence check with the write.
        self.view_tx.send_if_modified(|view| {
            let last = self.committed.load(Ordering::SeqCst);
            if seq <= last {
                debug!(seq, last, "discarding superseded reconcile result");
                return false;
            }

            match &fetched {
                Ok(None) => {
                    if view.snapshot().is_some() {
                        info!("round cleared, no active round");
                    }
                    *view = RoundView::NoActiveRound;
                }
                Ok(Some(next)) => {
                    let highest = self.highest_round.load(Ordering::SeqCst);
                    if next.round_id < highest {
                        warn!(
                            held = highest,
                            seen = next.round_id,
                            "ignoring round id regression from lagging node"
                        );
                        outcome = Some(Err(ReconcileError::Regressed {
                            held: highest,
                            seen: next.round_id,
                        }));
                        return false;
                    }
                    if next.round_id > highest {
                        info!(round_id = next.round_id, "new round observed");
                        self.highest_round.store(next.round_id, Ordering::SeqCst);
                    }
                    *view = RoundView::Live(next.clone());
                }
                Err(err) => {
                    let error = err.to_string();
                    *view = match view.snapshot() {
                        Some(snapshot) => RoundView::Stale {
                            snapshot: snapshot.clone(),
                            error,
                        },
                        None => RoundView::Unavailable { error },
                    };
                }
            }
            self.committed.store(seq, Ordering::SeqCst);
            true
        });

        match outcome {
            Some(rejected) => rejected,
            None => fetched.map_err(ReconcileError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use lottery_lib::client::{
        mock::{Fault, MockLedger},
        LedgerWriter,
    };
    use std::time::Duration;

    fn setup() -> (Arc<MockLedger>, Reconciler<MockLedger>) {
        let ledger = Arc::new(MockLedger::new(Address::repeat_byte(0xaa)));
        let reconciler = Reconciler::new(ledger.clone());
        (ledger, reconciler)
    }

    #[tokio::test]
    async fn round_zero_short_circuits() {
        let (ledger, reconciler) = setup();

        let result = reconciler.reconcile().await.unwrap();
        assert!(result.is_none());
        assert!(matches!(reconciler.view(), RoundView::NoActiveRound));
        assert_eq!(ledger.round_id_reads(), 1);
        assert_eq!(ledger.round_info_reads(), 0);
    }

    #[tokio::test]
    async fn every_fetch_builds_a_new_snapshot() {
        let (ledger, reconciler) = setup();
        ledger.open_round(U256::from(10u64), 50);
        let mut rx = reconciler.subscribe();

        let first = reconciler.reconcile().await.unwrap().unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        let second = reconciler.reconcile().await.unwrap().unwrap();
        assert_eq!(first.round_id, second.round_id);
        assert_eq!(first.pot, second.pot);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn held_round_id_never_decreases() {
        let (ledger, reconciler) = setup();
        let mut seen = Vec::new();

        for _ in 0..3 {
            ledger.open_round(U256::from(1u64), 5);
            reconciler.reconcile().await.unwrap();
            seen.push(reconciler.view().snapshot().unwrap().round_id);
        }
        assert_eq!(seen, vec![1, 2, 3]);

        ledger.report_round_id(Some(2));
        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Regressed { held: 3, seen: 2 }));
        assert_eq!(reconciler.view().snapshot().unwrap().round_id, 3);
    }

    #[tokio::test]
    async fn round_id_cannot_regress_through_no_active_round() {
        let (ledger, reconciler) = setup();
        for _ in 0..3 {
            ledger.open_round(U256::from(1u64), 5);
        }
        reconciler.reconcile().await.unwrap();

        ledger.report_round_id(Some(0));
        assert!(reconciler.reconcile().await.unwrap().is_none());
        assert!(matches!(reconciler.view(), RoundView::NoActiveRound));

        ledger.report_round_id(Some(2));
        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Regressed { held: 3, seen: 2 }));
        assert!(matches!(reconciler.view(), RoundView::NoActiveRound));

        ledger.report_round_id(None);
        let snapshot = reconciler.reconcile().await.unwrap().unwrap();
        assert_eq!(snapshot.round_id, 3);
    }

    #[tokio::test]
    async fn failure_keeps_last_good_snapshot_as_stale() {
        let (ledger, reconciler) = setup();
        ledger.open_round(U256::from(10u64), 50);
        let good = reconciler.reconcile().await.unwrap().unwrap();

        ledger.inject_read_faults(Fault::Timeout, 1);
        assert!(reconciler.reconcile().await.is_err());
        match reconciler.view() {
            RoundView::Stale { snapshot, error } => {
                assert!(Arc::ptr_eq(&snapshot, &good));
                assert!(error.contains("timed out"));
            }
            other => panic!("expected stale view, got {:?}", other),
        }

        reconciler.reconcile().await.unwrap();
        assert!(matches!(reconciler.view(), RoundView::Live(_)));
    }

    #[tokio::test]
    async fn failure_without_history_is_unavailable() {
        let (ledger, reconciler) = setup();
        ledger.inject_read_faults(Fault::Malformed, 1);

        let err = reconciler.reconcile().await.unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(reconciler.view(), RoundView::Unavailable { .. }));
    }

    #[tokio::test]
    async fn no_active_round_is_not_a_failure() {
        let (ledger, reconciler) = setup();
        ledger.open_round(U256::from(10u64), 50);
        reconciler.reconcile().await.unwrap();

        ledger.report_round_id(Some(0));
        assert!(reconciler.reconcile().await.unwrap().is_none());
        assert!(matches!(reconciler.view(), RoundView::NoActiveRound));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_result_does_not_overwrite_newer_one() {
        let (ledger, reconciler) = setup();
        let player = Address::repeat_byte(0x01);
        let price = U256::from(10u64);
        let id = ledger.open_round(price, 50);
        ledger.push_round_info_delay(Duration::from_secs(5));

        let slow = reconciler.reconcile();
        let fast = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            ledger.buy_ticket(player, id, price).await.unwrap();
            reconciler.reconcile().await
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert_eq!(slow.unwrap().unwrap().ticket_count(), 0);
        assert_eq!(fast.unwrap().unwrap().ticket_count(), 1);
        assert_eq!(reconciler.view().snapshot().unwrap().ticket_count(), 1);
    }
}
