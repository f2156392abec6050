use anyhow::{bail, ensure, Context, Result};
use lottery_lib::{
    client::{LedgerReader, LedgerWriter},
    types::TxOutcome,
    wallet::Session,
};
use tracing::info;

use crate::sync::PollerHandle;

/// Reveal the commit secret for the current round and pay out the winner.
pub async fn run_one<L>(
    ledger: &L,
    session: &Session,
    secret: &str,
    poller: Option<&PollerHandle>,
) -> Result<TxOutcome>
where
    L: LedgerReader + LedgerWriter + ?Sized,
{
    if !session.is_owner {
        bail!("only the contract owner can reveal a winner");
    }
    ensure!(!secret.trim().is_empty(), "secret must not be empty");

    let round_id = ledger
        .current_round_id()
        .await
        .context("reading current round id")?;
    if round_id == 0 {
        bail!("no round to reveal");
    }

    info!(round_id, "revealing winner");
    let outcome = ledger
        .reveal_and_payout(session.account, round_id, secret)
        .await
        .with_context(|| format!("revealAndPayout failed for round {}", round_id))?;
    info!(round_id, tx = %outcome.tx, "winner paid out");

    if let Some(poller) = poller {
        poller.refresh();
    }
    Ok(outcome)
}
