use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use futures::future::join_all;
use lottery_lib::{client::LedgerReader, types::RoundSnapshot};
use tracing::{debug, warn};

pub const DEFAULT_BATCH_SIZE: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PastRound {
    pub round_id: u64,
    pub winner: Option<Address>,
    pub pot: U256,
    pub ticket_price: U256,
    pub player_count: usize,
}

impl From<RoundSnapshot> for PastRound {
    fn from(snapshot: RoundSnapshot) -> Self {
        Self {
            round_id: snapshot.round_id,
            winner: snapshot.winner,
            pot: snapshot.pot,
            ticket_price: snapshot.ticket_price,
            player_count: snapshot.ticket_count(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub total_rounds: usize,
    pub total_prizes: U256,
    pub total_players: usize,
}

impl AggregateStats {
    pub fn from_rounds(rounds: &[PastRound]) -> Self {
        rounds.iter().fold(Self::default(), |mut acc, round| {
            acc.total_rounds += 1;
            acc.total_prizes = acc.total_prizes.saturating_add(round.pot);
            acc.total_players += round.player_count;
            acc
        })
    }
}

/// Every round before the current one, newest first.
///
/// Rounds are read `batch_size` at a time, concurrently within a batch. A
/// round that fails to load is logged and left out.
pub async fn fetch_past_rounds<R>(reader: &R, batch_size: u64) -> Result<Vec<PastRound>>
where
    R: LedgerReader + ?Sized,
{
    let current = reader
        .current_round_id()
        .await
        .context("reading current round id")?;
    let mut rounds = Vec::new();
    if current <= 1 {
        return Ok(rounds);
    }

    let batch_size = batch_size.max(1);
    let mut upper = current - 1;
    loop {
        let lower = upper.saturating_sub(batch_size - 1).max(1);
        let ids: Vec<u64> = (lower..=upper).rev().collect();
        debug!(from = upper, to = lower, "fetching past rounds");

        let fetched = join_all(ids.iter().map(|&id| async move {
            let raw = reader.round_info(id).await?;
            RoundSnapshot::from_raw(id, raw)
        }))
        .await;

        for (id, result) in ids.into_iter().zip(fetched) {
            match result {
                Ok(snapshot) => rounds.push(PastRound::from(snapshot)),
                Err(err) => warn!(round_id = id, error = %err, "skipping round"),
            }
        }

        if lower == 1 {
            break;
        }
        upper = lower - 1;
    }

    Ok(rounds)
}
