//! In-memory ledger for local runs and tests.
//!
//! Mirrors the contract's observable behaviour closely enough for the client:
//! rounds, tickets, a block counter, owner checks and a reveal that picks a
//! winner. It makes no attempt at fair randomness.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    client::{BlockHeightSource, LedgerReader, LedgerWriter},
    error::LedgerError,
    types::{RawRoundInfo, TxOutcome},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    Malformed,
}

impl Fault {
    fn into_error(self) -> LedgerError {
        match self {
            Fault::Timeout => LedgerError::Timeout(0),
            Fault::Malformed => LedgerError::Malformed("injected malformed response".into()),
        }
    }
}

#[derive(Clone, Debug)]
struct MockRound {
    ticket_price: U256,
    end_block: u64,
    pot: U256,
    players: Vec<Address>,
    winner: Address,
    active: bool,
}

#[derive(Debug, Default)]
struct MockState {
    rounds: Vec<MockRound>,
    block: u64,
    owner: Address,
    fee_bps: u16,
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    read_faults: VecDeque<Fault>,
    height_faults: usize,
    read_delays: VecDeque<Duration>,
    /// Overrides `currentRoundId`, used to simulate a lagging node.
    reported_round: Option<u64>,
    tx_nonce: u64,
}

#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
    round_id_reads: AtomicUsize,
    round_info_reads: AtomicUsize,
    height_reads: AtomicUsize,
}

impl MockLedger {
    pub fn new(owner: Address) -> Self {
        let ledger = Self::default();
        {
            let mut state = ledger.lock();
            state.owner = owner;
            state.accounts = vec![owner];
            state.block = 1;
        }
        ledger
    }

    /// A ledger with one running round, handy for demos.
    pub fn with_demo_round(owner: Address) -> Self {
        let ledger = Self::new(owner);
        {
            let mut state = ledger.lock();
            state.block = 1_000;
            let price = U256::from(10_000_000_000_000_000u64);
            let players: Vec<Address> = (1..=7u8).map(Address::repeat_byte).collect();
            state.rounds.push(MockRound {
                ticket_price: U256::from(20_000_000_000_000_000u64),
                end_block: 900,
                pot: U256::from(100_000_000_000_000_000u64),
                players: (1..=5u8).map(Address::repeat_byte).collect(),
                winner: Address::repeat_byte(3),
                active: false,
            });
            state.rounds.push(MockRound {
                ticket_price: price,
                pot: price * U256::from(players.len()),
                players,
                end_block: 1_000 + 1_200,
                winner: Address::ZERO,
                active: true,
            });
        }
        ledger
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the other assertions.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_block(&self, block: u64) {
        self.lock().block = block;
    }

    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.lock();
        state.block = state.block.saturating_add(blocks);
    }

    pub fn set_fee_bps(&self, fee_bps: u16) {
        self.lock().fee_bps = fee_bps;
    }

    pub fn add_account(&self, account: Address, balance: U256) {
        let mut state = self.lock();
        if !state.accounts.contains(&account) {
            state.accounts.push(account);
        }
        state.balances.insert(account, balance);
    }

    /// Queue `count` failures for the next round reads.
    pub fn inject_read_faults(&self, fault: Fault, count: usize) {
        let mut state = self.lock();
        state.read_faults.extend(std::iter::repeat(fault).take(count));
    }

    pub fn inject_height_faults(&self, count: usize) {
        self.lock().height_faults += count;
    }

    /// Hold back the next `getRoundInfo` answer for `delay`. The answer is
    /// taken before the wait, like a slow response carrying older data.
    pub fn push_round_info_delay(&self, delay: Duration) {
        self.lock().read_delays.push_back(delay);
    }

    pub fn report_round_id(&self, round_id: Option<u64>) {
        self.lock().reported_round = round_id;
    }

    /// Start a round directly, bypassing owner checks.
    pub fn open_round(&self, ticket_price: U256, duration_blocks: u64) -> u64 {
        let mut state = self.lock();
        let end_block = state.block + duration_blocks;
        if let Some(last) = state.rounds.last_mut() {
            last.active = false;
        }
        state.rounds.push(MockRound {
            ticket_price,
            end_block,
            pot: U256::ZERO,
            players: Vec::new(),
            winner: Address::ZERO,
            active: true,
        });
        state.rounds.len() as u64
    }

    pub fn round_id_reads(&self) -> usize {
        self.round_id_reads.load(Ordering::SeqCst)
    }

    pub fn round_info_reads(&self) -> usize {
        self.round_info_reads.load(Ordering::SeqCst)
    }

    pub fn height_reads(&self) -> usize {
        self.height_reads.load(Ordering::SeqCst)
    }

    fn next_tx(state: &mut MockState) -> TxOutcome {
        state.tx_nonce += 1;
        let tx = B256::left_padding_from(&state.tx_nonce.to_be_bytes());
        // Each mined transaction advances the chain by one block.
        state.block += 1;
        TxOutcome {
            tx,
            block: Some(state.block),
        }
    }

    fn read_round(state: &mut MockState, round_id: u64) -> Result<RawRoundInfo, LedgerError> {
        if let Some(fault) = state.read_faults.pop_front() {
            return Err(fault.into_error());
        }
        let round = round_id
            .checked_sub(1)
            .and_then(|idx| state.rounds.get(idx as usize))
            .ok_or_else(|| LedgerError::Rpc {
                code: 3,
                message: format!("execution reverted: round {} does not exist", round_id),
            })?;

        Ok(RawRoundInfo {
            ticket_price: round.ticket_price,
            end_block: U256::from(round.end_block),
            pot: round.pot,
            players: round.players.clone(),
            winner: round.winner,
            active: round.active,
        })
    }

    fn require_owner(state: &MockState, from: Address) -> Result<(), LedgerError> {
        if from != state.owner {
            return Err(LedgerError::Rejected(format!(
                "OwnableUnauthorizedAccount({})",
                from
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn current_round_id(&self) -> Result<u64, LedgerError> {
        self.round_id_reads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(fault) = state.read_faults.pop_front() {
            return Err(fault.into_error());
        }
        Ok(state
            .reported_round
            .unwrap_or(state.rounds.len() as u64))
    }

    async fn round_info(&self, round_id: u64) -> Result<RawRoundInfo, LedgerError> {
        self.round_info_reads.fetch_add(1, Ordering::SeqCst);
        let (answer, delay) = {
            let mut state = self.lock();
            let delay = state.read_delays.pop_front();
            (Self::read_round(&mut state, round_id), delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }

    async fn owner(&self) -> Result<Address, LedgerError> {
        Ok(self.lock().owner)
    }

    async fn fee_bps(&self) -> Result<u16, LedgerError> {
        Ok(self.lock().fee_bps)
    }
}

#[async_trait]
impl BlockHeightSource for MockLedger {
    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.height_reads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.height_faults > 0 {
            state.height_faults -= 1;
            return Err(LedgerError::Timeout(0));
        }
        Ok(state.block)
    }
}

#[async_trait]
impl LedgerWriter for MockLedger {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self.lock().accounts.clone())
    }

    async fn balance(&self, account: Address) -> Result<U256, LedgerError> {
        Ok(self
            .lock()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    async fn buy_ticket(
        &self,
        from: Address,
        round_id: u64,
        value: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let mut state = self.lock();
        let block = state.block;
        let current = state.rounds.len() as u64;
        if round_id == 0 || round_id != current {
            return Err(LedgerError::Rejected(format!("round {} is not current", round_id)));
        }
        let round = state
            .rounds
            .last_mut()
            .ok_or_else(|| LedgerError::Rejected("no active round".into()))?;
        if !round.active || block >= round.end_block {
            return Err(LedgerError::Rejected("round closed".into()));
        }
        if value != round.ticket_price {
            return Err(LedgerError::Rejected("wrong ticket price".into()));
        }
        round.players.push(from);
        round.pot += value;
        Ok(Self::next_tx(&mut state))
    }

    async fn start_round(
        &self,
        from: Address,
        ticket_price: U256,
        duration_blocks: u64,
        secret: &str,
    ) -> Result<TxOutcome, LedgerError> {
        let mut state = self.lock();
        Self::require_owner(&state, from)?;
        if ticket_price.is_zero() || duration_blocks == 0 || secret.is_empty() {
            return Err(LedgerError::Rejected("invalid round parameters".into()));
        }
        if state.rounds.last().is_some_and(|r| r.active) {
            return Err(LedgerError::Rejected("previous round still active".into()));
        }
        let end_block = state.block + duration_blocks;
        state.rounds.push(MockRound {
            ticket_price,
            end_block,
            pot: U256::ZERO,
            players: Vec::new(),
            winner: Address::ZERO,
            active: true,
        });
        Ok(Self::next_tx(&mut state))
    }

    async fn reveal_and_payout(
        &self,
        from: Address,
        round_id: u64,
        secret: &str,
    ) -> Result<TxOutcome, LedgerError> {
        let mut state = self.lock();
        Self::require_owner(&state, from)?;
        let block = state.block;
        let round = round_id
            .checked_sub(1)
            .and_then(|idx| state.rounds.get_mut(idx as usize))
            .ok_or_else(|| LedgerError::Rejected(format!("unknown round {}", round_id)))?;
        if !round.active {
            return Err(LedgerError::Rejected("round already paid out".into()));
        }
        if block < round.end_block {
            return Err(LedgerError::Rejected("round has not ended yet".into()));
        }
        if secret.is_empty() {
            return Err(LedgerError::Rejected("secret mismatch".into()));
        }
        if !round.players.is_empty() {
            let idx = (block as usize + secret.len()) % round.players.len();
            round.winner = round.players[idx];
        }
        round.active = false;
        Ok(Self::next_tx(&mut state))
    }
}
