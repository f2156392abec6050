use alloy_primitives::{utils::parse_ether, U256};
use anyhow::{bail, ensure, Context, Result};
use lottery_lib::{client::LedgerWriter, types::TxOutcome, wallet::Session};
use rand::{distr::Alphanumeric, Rng};
use tracing::info;

use crate::sync::PollerHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundParams {
    pub ticket_price: U256,
    pub duration_blocks: u64,
    pub secret: String,
}

impl RoundParams {
    /// `ticket_price` is a whole-coin decimal such as `0.01`.
    pub fn parse(ticket_price: &str, duration_blocks: u64, secret: impl Into<String>) -> Result<Self> {
        let ticket_price = parse_ether(ticket_price.trim())
            .with_context(|| format!("invalid ticket price {:?}", ticket_price))?;
        let secret = secret.into();

        ensure!(!ticket_price.is_zero(), "ticket price must be greater than zero");
        ensure!(duration_blocks > 0, "duration must be at least one block");
        ensure!(!secret.trim().is_empty(), "secret must not be empty");

        Ok(Self {
            ticket_price,
            duration_blocks,
            secret,
        })
    }
}

/// A fresh commit secret, `secret-` followed by random alphanumerics.
pub fn generate_secret() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("secret-{}", suffix.to_lowercase())
}

pub async fn run_one<L>(
    ledger: &L,
    session: &Session,
    params: &RoundParams,
    poller: Option<&PollerHandle>,
) -> Result<TxOutcome>
where
    L: LedgerWriter + ?Sized,
{
    if !session.is_owner {
        bail!("only the contract owner can start a round");
    }

    info!(
        ticket_price = %params.ticket_price,
        duration_blocks = params.duration_blocks,
        "starting round"
    );
    let outcome = ledger
        .start_round(
            session.account,
            params.ticket_price,
            params.duration_blocks,
            &params.secret,
        )
        .await
        .context("startRound failed")?;
    info!(tx = %outcome.tx, block = ?outcome.block, "round started");

    if let Some(poller) = poller {
        poller.refresh();
    }
    Ok(outcome)
}
