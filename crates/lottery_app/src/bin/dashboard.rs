use alloy_primitives::Address;
use anyhow::Result;
use clap::Parser;
use lottery_app::{config, logging, sync::RoundWatch, view, App};
use lottery_lib::client::mock::MockLedger;
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    time::{interval, MissedTickBehavior},
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Follow the current lottery round and its countdown")]
struct Args {
    /// Run against an in-memory ledger with a demo round.
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = if args.mock {
        config::load_offline()?
    } else {
        config::load()?
    };
    logging::init_tracing(&cfg);

    let app = if args.mock {
        let ledger = Arc::new(MockLedger::with_demo_round(Address::repeat_byte(0xaa)));
        spawn_block_producer(ledger.clone(), Duration::from_secs(cfg.seconds_per_block.max(1)));
        App::with_ledger(ledger, &cfg)
    } else {
        App::init_from(cfg)?
    };

    match app.connect_session().await {
        Ok(session) => info!(
            account = %session.short_account(),
            is_owner = session.is_owner,
            balance = %view::format_coin(session.balance),
            "session ready"
        ),
        Err(e) => warn!(error = %format!("{:#}", e), "continuing without a wallet"),
    }

    let fee_bps = app.fee_bps().await;

    let round_watch = RoundWatch::start(app.ledger(), app.watch_settings());
    let mut rounds = round_watch.rounds();
    let mut countdown = round_watch.countdown();

    // Enter on stdin forces a refresh.
    let mut input = BufReader::new(stdin()).lines();
    let mut input_open = true;
    eprintln!("press Enter to refresh, Ctrl-C to quit");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = input.next_line(), if input_open => {
                match line {
                    Ok(Some(_)) => {
                        if round_watch.refresh() {
                            info!("manual refresh requested");
                        }
                    }
                    Ok(None) => input_open = false,
                    Err(e) => {
                        warn!(error = %e, "stdin unreadable, manual refresh disabled");
                        input_open = false;
                    }
                }
                continue;
            }
            changed = rounds.changed() => if changed.is_err() { break },
            changed = countdown.changed() => if changed.is_err() { break },
        }

        let current = rounds.borrow_and_update().clone();
        let remaining = *countdown.borrow_and_update();
        println!(
            "{}\n",
            view::render_dashboard(&current, remaining, app.currency_symbol(), fee_bps)
        );
    }

    info!("shutting down");
    round_watch.stop().await;
    Ok(())
}

/// Moves the in-memory chain forward so the countdown has something to show.
fn spawn_block_producer(ledger: Arc<MockLedger>, block_time: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(block_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            ledger.advance_blocks(1);
        }
    });
}
