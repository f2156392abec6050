use anyhow::{bail, Context, Result};
use lottery_lib::{
    client::{LedgerReader, LedgerWriter},
    types::{RoundSnapshot, TxOutcome},
    wallet::Session,
};
use tracing::info;

use crate::sync::PollerHandle;

/// Buy one ticket in the current round at its listed price, then ask the
/// poller (if any) for an immediate refresh.
pub async fn run_one<L>(
    ledger: &L,
    session: &Session,
    poller: Option<&PollerHandle>,
) -> Result<TxOutcome>
where
    L: LedgerReader + LedgerWriter + ?Sized,
{
    let round_id = ledger
        .current_round_id()
        .await
        .context("reading current round id")?;
    if round_id == 0 {
        bail!("no active round");
    }

    let raw = ledger
        .round_info(round_id)
        .await
        .with_context(|| format!("reading round {}", round_id))?;
    let round = RoundSnapshot::from_raw(round_id, raw)?;
    if !round.is_active {
        bail!("round {} has ended", round_id);
    }
    if round.ticket_price.is_zero() {
        bail!("round {} has no ticket price", round_id);
    }

    info!(
        round_id,
        account = %session.account,
        value = %round.ticket_price,
        "buying ticket"
    );
    let outcome = ledger
        .buy_ticket(session.account, round_id, round.ticket_price)
        .await
        .with_context(|| format!("buyTicket failed for round {}", round_id))?;
    info!(round_id, tx = %outcome.tx, block = ?outcome.block, "ticket purchased");

    if let Some(poller) = poller {
        poller.refresh();
    }
    Ok(outcome)
}
