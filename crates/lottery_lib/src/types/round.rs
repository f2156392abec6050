use crate::error::LedgerError;
use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};

/// `getRoundInfo` return tuple as the contract reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRoundInfo {
    pub ticket_price: U256,
    pub end_block: U256,
    pub pot: U256,
    pub players: Vec<Address>,
    pub winner: Address,
    pub active: bool,
}

/// View of one lottery round at the moment it was fetched.
///
/// Snapshots are immutable once built; a newer fetch always produces a new
/// value instead of patching an old one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub ticket_price: U256,
    pub end_block: u64,
    pub pot: U256,
    pub players: Vec<Address>,
    pub is_active: bool,
    pub winner: Option<Address>,
    pub fetched_at: DateTime<Utc>,
}

impl RoundSnapshot {
    pub fn from_raw(round_id: u64, raw: RawRoundInfo) -> Result<Self, LedgerError> {
        if round_id == 0 {
            return Err(LedgerError::Malformed(
                "round info requested for round 0".to_string(),
            ));
        }
        let end_block = u64::try_from(raw.end_block).map_err(|_| {
            LedgerError::Malformed(format!(
                "end block {} of round {} does not fit a block height",
                raw.end_block, round_id
            ))
        })?;

        Ok(Self {
            round_id,
            ticket_price: raw.ticket_price,
            end_block,
            pot: raw.pot,
            players: raw.players,
            is_active: raw.active,
            winner: (raw.winner != Address::ZERO).then_some(raw.winner),
            fetched_at: Utc::now(),
        })
    }

    pub fn ticket_count(&self) -> usize {
        self.players.len()
    }

    /// Whether `pot == ticket_price * tickets`. The contract owns this
    /// invariant; the client only reports on it.
    pub fn pot_matches_tickets(&self) -> bool {
        self.ticket_price
            .checked_mul(U256::from(self.players.len()))
            .is_some_and(|expected| expected == self.pot)
    }
}
