//! Keeps a local view of the running round in step with the contract.
//!
//! Two timers run side by side: the poller refreshes the round view, the
//! countdown ticker turns the latest view into a time estimate. They share
//! nothing but the view channel.

use lottery_lib::client::{BlockHeightSource, LedgerReader};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

pub mod countdown;
pub mod reconciler;
pub mod scheduler;

pub use countdown::{Countdown, CountdownEstimator, CountdownHandle};
pub use reconciler::{ReconcileError, Reconciler, RoundView};
pub use scheduler::PollerHandle;

#[derive(Clone, Copy, Debug)]
pub struct WatchSettings {
    pub poll_period: Duration,
    pub countdown_period: Duration,
    pub seconds_per_block: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_period: scheduler::DEFAULT_POLL_PERIOD,
            countdown_period: Duration::from_secs(3),
            seconds_per_block: countdown::DEFAULT_SECONDS_PER_BLOCK,
        }
    }
}

/// Both timers for one mounted dashboard.
pub struct RoundWatch<R: ?Sized> {
    reconciler: Arc<Reconciler<R>>,
    poller: PollerHandle,
    countdown: CountdownHandle,
}

impl<R> RoundWatch<R>
where
    R: LedgerReader + BlockHeightSource + ?Sized + 'static,
{
    pub fn start(ledger: Arc<R>, settings: WatchSettings) -> Self {
        let reconciler = Arc::new(Reconciler::new(ledger.clone()));
        let poller = scheduler::start(reconciler.clone(), settings.poll_period);
        let countdown = countdown::start(
            ledger,
            CountdownEstimator::new(settings.seconds_per_block),
            settings.countdown_period,
            reconciler.subscribe(),
        );

        Self {
            reconciler,
            poller,
            countdown,
        }
    }

    pub fn rounds(&self) -> watch::Receiver<RoundView> {
        self.reconciler.subscribe()
    }

    pub fn countdown(&self) -> watch::Receiver<Countdown> {
        self.countdown.subscribe()
    }

    pub fn view(&self) -> RoundView {
        self.reconciler.view()
    }

    /// Out-of-band reconcile; the periodic schedule is left as is.
    pub fn refresh(&self) -> bool {
        self.poller.refresh()
    }

    pub async fn stop(self) {
        self.poller.stop().await;
        self.countdown.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use lottery_lib::client::{mock::MockLedger, LedgerWriter};

    #[tokio::test(start_paused = true)]
    async fn view_and_countdown_follow_the_ledger() {
        let ledger = Arc::new(MockLedger::new(Address::repeat_byte(0xaa)));
        ledger.set_block(100);
        ledger.open_round(U256::from(1u64), 6);

        let round_watch = RoundWatch::start(ledger.clone(), WatchSettings::default());
        let mut countdown = round_watch.countdown();

        loop {
            countdown.changed().await.unwrap();
            if let Countdown::Remaining { .. } = *countdown.borrow_and_update() {
                break;
            }
        }
        assert_eq!(countdown.borrow().to_string(), "0m 18s remaining (est.)");
        assert_eq!(round_watch.view().snapshot().unwrap().round_id, 1);

        round_watch.stop().await;
        let reads = ledger.round_id_reads();
        let heights = ledger.height_reads();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ledger.round_id_reads(), reads);
        assert_eq!(ledger.height_reads(), heights);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_picks_up_a_purchase_before_the_next_poll() {
        let ledger = Arc::new(MockLedger::new(Address::repeat_byte(0xaa)));
        let price = U256::from(3u64);
        let id = ledger.open_round(price, 50);

        let round_watch = RoundWatch::start(ledger.clone(), WatchSettings::default());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(round_watch.view().snapshot().unwrap().ticket_count(), 0);

        ledger
            .buy_ticket(Address::repeat_byte(0x01), id, price)
            .await
            .unwrap();
        assert!(round_watch.refresh());
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(ledger.round_id_reads(), 2);
        assert_eq!(round_watch.view().snapshot().unwrap().ticket_count(), 1);
        round_watch.stop().await;
    }
}
