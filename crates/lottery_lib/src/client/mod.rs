use crate::error::LedgerError;
use crate::types::{RawRoundInfo, TxOutcome};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

pub mod contract;
pub mod mock;
pub mod rpc;

/// Read-only queries against the lottery contract.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Active round id, `0` when no round was ever started.
    async fn current_round_id(&self) -> Result<u64, LedgerError>;

    async fn round_info(&self, round_id: u64) -> Result<RawRoundInfo, LedgerError>;

    async fn owner(&self) -> Result<Address, LedgerError>;

    async fn fee_bps(&self) -> Result<u16, LedgerError>;
}

#[async_trait]
pub trait BlockHeightSource: Send + Sync {
    async fn block_number(&self) -> Result<u64, LedgerError>;
}

/// Transaction submission through the provider that holds the keys.
/// Each call returns once the transaction is mined.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError>;

    async fn balance(&self, account: Address) -> Result<U256, LedgerError>;

    async fn buy_ticket(
        &self,
        from: Address,
        round_id: u64,
        value: U256,
    ) -> Result<TxOutcome, LedgerError>;

    async fn start_round(
        &self,
        from: Address,
        ticket_price: U256,
        duration_blocks: u64,
        secret: &str,
    ) -> Result<TxOutcome, LedgerError>;

    async fn reveal_and_payout(
        &self,
        from: Address,
        round_id: u64,
        secret: &str,
    ) -> Result<TxOutcome, LedgerError>;
}

/// Everything a client needs from one endpoint.
pub trait Ledger: LedgerReader + BlockHeightSource + LedgerWriter {}

impl<T: LedgerReader + BlockHeightSource + LedgerWriter + ?Sized> Ledger for T {}
