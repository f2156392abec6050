use alloy_primitives::{B256, U64};
use serde::Deserialize;

/// Subset of `eth_getTransactionReceipt` the client inspects.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<U64>,
    pub status: Option<U64>,
}

impl TxReceipt {
    /// Pre-Byzantium receipts carry no status; treat them as successful.
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s == U64::from(1))
    }
}

/// A transaction that was mined successfully.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx: B256,
    pub block: Option<u64>,
}
