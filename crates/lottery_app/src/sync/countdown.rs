use lottery_lib::{client::BlockHeightSource, types::RoundSnapshot};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::debug;

use super::reconciler::RoundView;

pub const DEFAULT_SECONDS_PER_BLOCK: u64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Countdown {
    NoActiveRound,
    /// Block height not known yet; retried on the next tick.
    Calculating,
    Ended,
    Finalizable,
    Remaining { seconds: u64 },
}

impl Countdown {
    /// No further ticks can change the outcome for the same snapshot.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Countdown::Ended | Countdown::Finalizable)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::NoActiveRound => write!(f, "No active round"),
            Countdown::Calculating => write!(f, "Calculating..."),
            Countdown::Ended => write!(f, "Round Ended"),
            Countdown::Finalizable => write!(f, "Round Can Be Finalized"),
            Countdown::Remaining { seconds } => {
                let hours = seconds / 3600;
                let minutes = (seconds % 3600) / 60;
                let secs = seconds % 60;
                if hours > 0 {
                    write!(f, "{}h ", hours)?;
                }
                write!(f, "{}m {}s remaining (est.)", minutes, secs)
            }
        }
    }
}

/// Converts a block delta into an estimated wall-clock countdown.
#[derive(Clone, Copy, Debug)]
pub struct CountdownEstimator {
    seconds_per_block: u64,
}

impl Default for CountdownEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SECONDS_PER_BLOCK)
    }
}

impl CountdownEstimator {
    pub fn new(seconds_per_block: u64) -> Self {
        Self { seconds_per_block }
    }

    pub fn estimate(&self, snapshot: Option<&RoundSnapshot>, height: Option<u64>) -> Countdown {
        let Some(snapshot) = snapshot else {
            return Countdown::NoActiveRound;
        };
        if !snapshot.is_active {
            return Countdown::Ended;
        }
        let Some(height) = height else {
            return Countdown::Calculating;
        };
        if snapshot.end_block <= height {
            return Countdown::Finalizable;
        }

        let blocks_remaining = snapshot.end_block - height;
        Countdown::Remaining {
            seconds: blocks_remaining.saturating_mul(self.seconds_per_block),
        }
    }
}

/// Running countdown task. Stopping it (or dropping the handle) ends the
/// timer; it never touches the round view.
pub struct CountdownHandle {
    rx: watch::Receiver<Countdown>,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.rx.clone()
    }

    pub fn current(&self) -> Countdown {
        *self.rx.borrow()
    }

    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Spawn the countdown timer. It ticks every `period` while `rounds` holds a
/// snapshot, halts after a terminal estimate and restarts whenever a new view
/// is published.
pub fn start<H>(
    heights: Arc<H>,
    estimator: CountdownEstimator,
    period: Duration,
    rounds: watch::Receiver<RoundView>,
) -> CountdownHandle
where
    H: BlockHeightSource + ?Sized + 'static,
{
    let (tx, rx) = watch::channel(Countdown::Calculating);
    let task = tokio::spawn(run(heights, estimator, period, rounds, tx));
    CountdownHandle {
        rx,
        task: Some(task),
    }
}

async fn run<H>(
    heights: Arc<H>,
    estimator: CountdownEstimator,
    period: Duration,
    mut rounds: watch::Receiver<RoundView>,
    tx: watch::Sender<Countdown>,
) where
    H: BlockHeightSource + ?Sized,
{
    let publish = |next: Countdown| {
        tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    };

    'views: loop {
        let snapshot = rounds.borrow_and_update().snapshot().cloned();

        if let Some(snapshot) = snapshot {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = rounds.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue 'views;
                    }
                    _ = ticker.tick() => {
                        let height = if snapshot.is_active {
                            match heights.block_number().await {
                                Ok(h) => Some(h),
                                Err(err) => {
                                    debug!(error = %err, "block height unavailable");
                                    None
                                }
                            }
                        } else {
                            None
                        };

                        let countdown = estimator.estimate(Some(&snapshot), height);
                        publish(countdown);
                        if countdown.is_terminal() {
                            debug!(round_id = snapshot.round_id, %countdown, "countdown stopped");
                            break;
                        }
                    }
                }
            }
        } else {
            publish(Countdown::NoActiveRound);
        }

        if rounds.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use chrono::Utc;
    use lottery_lib::client::mock::MockLedger;

    fn snapshot(end_block: u64, is_active: bool) -> RoundSnapshot {
        RoundSnapshot {
            round_id: 1,
            ticket_price: U256::from(1u64),
            end_block,
            pot: U256::ZERO,
            players: Vec::new(),
            is_active,
            winner: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn remaining_time_omits_zero_hours() {
        let est = CountdownEstimator::default();
        let countdown = est.estimate(Some(&snapshot(106, true)), Some(100));
        assert_eq!(countdown, Countdown::Remaining { seconds: 18 });
        assert_eq!(countdown.to_string(), "0m 18s remaining (est.)");

        let countdown = est.estimate(Some(&snapshot(100 + 1201, true)), Some(100));
        assert_eq!(countdown.to_string(), "1h 0m 3s remaining (est.)");
    }

    #[test]
    fn deadline_reached_is_finalizable() {
        let est = CountdownEstimator::default();
        let snap = snapshot(100, true);
        for height in [100, 101, 5_000] {
            let countdown = est.estimate(Some(&snap), Some(height));
            assert_eq!(countdown.to_string(), "Round Can Be Finalized");
            assert!(countdown.is_terminal());
        }
    }

    #[test]
    fn inactive_round_has_ended_regardless_of_height() {
        let est = CountdownEstimator::default();
        let snap = snapshot(10_000, false);
        for height in [None, Some(0), Some(20_000)] {
            assert_eq!(est.estimate(Some(&snap), height).to_string(), "Round Ended");
        }
    }

    #[test]
    fn missing_height_or_snapshot() {
        let est = CountdownEstimator::default();
        let countdown = est.estimate(Some(&snapshot(100, true)), None);
        assert_eq!(countdown.to_string(), "Calculating...");
        assert!(!countdown.is_terminal());
        assert_eq!(est.estimate(None, Some(5)), Countdown::NoActiveRound);
    }

    #[test]
    fn estimate_is_pure() {
        let est = CountdownEstimator::new(5);
        let snap = snapshot(1_000, true);
        let a = est.estimate(Some(&snap), Some(400));
        let b = est.estimate(Some(&snap), Some(400));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a, Countdown::Remaining { seconds: 3_000 });
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_counts_down_then_halts() {
        let ledger = Arc::new(MockLedger::new(Address::ZERO));
        ledger.set_block(100);
        let (_view_tx, view_rx) =
            watch::channel(RoundView::Live(Arc::new(snapshot(106, true))));

        let handle = start(
            ledger.clone(),
            CountdownEstimator::default(),
            Duration::from_secs(3),
            view_rx,
        );
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Countdown::Remaining { seconds: 18 });

        ledger.set_block(106);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Countdown::Finalizable);

        let reads = ledger.height_reads();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ledger.height_reads(), reads);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn height_failure_is_transient() {
        let ledger = Arc::new(MockLedger::new(Address::ZERO));
        ledger.set_block(100);
        ledger.inject_height_faults(1);
        let (_view_tx, view_rx) =
            watch::channel(RoundView::Live(Arc::new(snapshot(110, true))));

        let handle = start(
            ledger.clone(),
            CountdownEstimator::default(),
            Duration::from_secs(3),
            view_rx,
        );
        let mut rx = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*rx.borrow_and_update(), Countdown::Calculating);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Countdown::Remaining { seconds: 30 });
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_when_a_new_view_arrives() {
        let ledger = Arc::new(MockLedger::new(Address::ZERO));
        ledger.set_block(50);
        let (view_tx, view_rx) = watch::channel(RoundView::NoActiveRound);

        let handle = start(
            ledger.clone(),
            CountdownEstimator::default(),
            Duration::from_secs(3),
            view_rx,
        );
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Countdown::NoActiveRound);
        assert_eq!(ledger.height_reads(), 0);

        view_tx.send_replace(RoundView::Live(Arc::new(snapshot(40, false))));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Countdown::Ended);
        assert_eq!(ledger.height_reads(), 0);

        view_tx.send_replace(RoundView::Live(Arc::new(snapshot(60, true))));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Countdown::Remaining { seconds: 30 });
    }
}
