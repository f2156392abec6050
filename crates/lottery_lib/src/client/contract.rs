use alloy_primitives::{Address, Bytes, B256, U256, U64};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    abi,
    client::{rpc::Rpc, BlockHeightSource, LedgerReader, LedgerWriter},
    error::LedgerError,
    types::{RawRoundInfo, TxOutcome, TxReceipt},
};

/// Narrow a contract integer to `u64`, reporting which field overflowed.
pub fn to_u64(value: U256, field: &str) -> Result<u64, LedgerError> {
    u64::try_from(value)
        .map_err(|_| LedgerError::Malformed(format!("{} {} does not fit u64", field, value)))
}

/// The deployed lottery contract reached through a node's JSON-RPC API.
pub struct LotteryContract {
    rpc: Rpc,
    address: Address,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl LotteryContract {
    pub fn new(rpc: Rpc, address: Address, receipt_poll_ms: u64, receipt_timeout_ms: u64) -> Self {
        Self {
            rpc,
            address,
            receipt_poll: Duration::from_millis(receipt_poll_ms),
            receipt_timeout: Duration::from_millis(receipt_timeout_ms),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn view<C: SolCall>(&self, call: C) -> Result<C::Return, LedgerError> {
        let data = Bytes::from(call.abi_encode());
        let out: Bytes = self
            .rpc
            .call(
                "eth_call",
                json!([{ "to": self.address, "data": data }, "latest"]),
            )
            .await?;

        // A missing contract answers every call with empty data.
        if out.is_empty() {
            return Err(LedgerError::Malformed(format!(
                "{} returned no data; is {} the lottery contract?",
                C::SIGNATURE,
                self.address
            )));
        }

        Ok(C::abi_decode_returns(&out, true)?)
    }

    async fn transact<C: SolCall>(
        &self,
        from: Address,
        call: C,
        value: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let tx = json!({
            "from": from,
            "to": self.address,
            "data": Bytes::from(call.abi_encode()),
            "value": value,
        });

        let hash: B256 = self.rpc.call_once("eth_sendTransaction", json!([tx])).await?;
        info!(tx = %hash, method = C::SIGNATURE, %from, "transaction submitted");

        self.wait_for_receipt(hash).await
    }

    async fn wait_for_receipt(&self, tx: B256) -> Result<TxOutcome, LedgerError> {
        let started = Instant::now();
        loop {
            let receipt: Option<TxReceipt> = self
                .rpc
                .call("eth_getTransactionReceipt", json!([tx]))
                .await?;

            if let Some(receipt) = receipt {
                if !receipt.succeeded() {
                    return Err(LedgerError::Reverted { tx });
                }
                let block = receipt.block_number.map(|b| b.to::<u64>());
                info!(tx = %receipt.transaction_hash, ?block, "transaction mined");
                return Ok(TxOutcome { tx, block });
            }

            if started.elapsed() >= self.receipt_timeout {
                return Err(LedgerError::ReceiptTimeout {
                    tx,
                    waited_ms: self.receipt_timeout.as_millis() as u64,
                });
            }
            debug!(tx = %tx, "receipt pending");
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

#[async_trait]
impl LedgerReader for LotteryContract {
    async fn current_round_id(&self) -> Result<u64, LedgerError> {
        let ret = self.view(abi::currentRoundIdCall {}).await?;
        to_u64(ret._0, "round id")
    }

    async fn round_info(&self, round_id: u64) -> Result<RawRoundInfo, LedgerError> {
        let ret = self
            .view(abi::getRoundInfoCall {
                roundId: U256::from(round_id),
            })
            .await?;

        Ok(RawRoundInfo {
            ticket_price: ret.ticketPrice,
            end_block: ret.endBlock,
            pot: ret.pot,
            players: ret.players,
            winner: ret.winner,
            active: ret.active,
        })
    }

    async fn owner(&self) -> Result<Address, LedgerError> {
        Ok(self.view(abi::ownerCall {}).await?._0)
    }

    async fn fee_bps(&self) -> Result<u16, LedgerError> {
        Ok(self.view(abi::feeBpsCall {}).await?._0)
    }
}

#[async_trait]
impl BlockHeightSource for LotteryContract {
    async fn block_number(&self) -> Result<u64, LedgerError> {
        let height: U64 = self.rpc.call("eth_blockNumber", json!([])).await?;
        Ok(height.to::<u64>())
    }
}

#[async_trait]
impl LedgerWriter for LotteryContract {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.rpc.call("eth_accounts", json!([])).await
    }

    async fn balance(&self, account: Address) -> Result<U256, LedgerError> {
        self.rpc
            .call("eth_getBalance", json!([account, "latest"]))
            .await
    }

    async fn buy_ticket(
        &self,
        from: Address,
        round_id: u64,
        value: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let call = abi::buyTicketCall {
            roundId: U256::from(round_id),
        };
        self.transact(from, call, value).await
    }

    async fn start_round(
        &self,
        from: Address,
        ticket_price: U256,
        duration_blocks: u64,
        secret: &str,
    ) -> Result<TxOutcome, LedgerError> {
        let call = abi::startRoundCall {
            ticketPriceWei: ticket_price,
            durationBlocks: U256::from(duration_blocks),
            secret: secret.to_string(),
        };
        self.transact(from, call, U256::ZERO).await
    }

    async fn reveal_and_payout(
        &self,
        from: Address,
        round_id: u64,
        secret: &str,
    ) -> Result<TxOutcome, LedgerError> {
        let call = abi::revealAndPayoutCall {
            roundId: U256::from(round_id),
            secret: secret.to_string(),
        };
        self.transact(from, call, U256::ZERO).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_contract_integers() {
        assert_eq!(to_u64(U256::from(42u64), "round id").unwrap(), 42);
        let err = to_u64(U256::MAX, "round id").unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("round id"));
    }
}
