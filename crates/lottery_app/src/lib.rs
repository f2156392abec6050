use crate::config::RuntimeConfig;
use crate::sync::WatchSettings;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use lottery_lib::{
    client::{contract::LotteryContract, rpc::Rpc, Ledger, LedgerReader},
    wallet::Session,
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

pub mod actions;
pub mod config;
pub mod history;
pub mod logging;
pub mod sync;
pub mod view;

pub struct App {
    ledger: Arc<dyn Ledger>,
    account: Option<Address>,
    settings: WatchSettings,
    currency_symbol: String,
}

impl App {
    pub fn init_from(cfg: RuntimeConfig) -> Result<Self> {
        let rpc = Rpc::new(
            &cfg.rpc_url,
            cfg.rpc_timeout_ms,
            cfg.rpc_max_retries,
            cfg.rpc_backoff_ms,
        );
        let contract = LotteryContract::new(
            rpc,
            cfg.contract_address,
            cfg.receipt_poll_ms,
            cfg.receipt_timeout_ms,
        );

        Ok(Self::with_ledger(Arc::new(contract), &cfg))
    }

    /// Build the app around any ledger, e.g. the in-memory one.
    pub fn with_ledger(ledger: Arc<dyn Ledger>, cfg: &RuntimeConfig) -> Self {
        Self {
            ledger,
            account: cfg.account_address,
            settings: WatchSettings {
                poll_period: Duration::from_secs(cfg.poll_period_in_secs.max(1)),
                countdown_period: Duration::from_secs(cfg.countdown_period_in_secs.max(1)),
                seconds_per_block: cfg.seconds_per_block,
            },
            currency_symbol: cfg.currency_symbol.clone(),
        }
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }

    pub fn watch_settings(&self) -> WatchSettings {
        self.settings
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Protocol fee, or `None` when the contract cannot be asked.
    pub async fn fee_bps(&self) -> Option<u16> {
        match self.ledger.fee_bps().await {
            Ok(fee_bps) => Some(fee_bps),
            Err(e) => {
                warn!(error = %e, "fee unavailable");
                None
            }
        }
    }

    pub async fn connect_session(&self) -> Result<Session> {
        Session::connect(self.ledger.as_ref(), self.account)
            .await
            .context("wallet connection failed")
    }
}
