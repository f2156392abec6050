use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use std::{env, str::FromStr};

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub rpc_url: String,
    pub rpc_timeout_ms: u64,
    pub rpc_max_retries: usize,
    pub rpc_backoff_ms: u64,
    pub receipt_poll_ms: u64,
    pub receipt_timeout_ms: u64,

    pub contract_address: Address,
    pub account_address: Option<Address>,

    pub poll_period_in_secs: u64,
    pub countdown_period_in_secs: u64,
    pub seconds_per_block: u64,
    pub currency_symbol: String,

    pub log_level: String,
    pub log_format: String,
    pub log_color: bool,
}

pub fn load() -> Result<RuntimeConfig> {
    load_inner(false)
}

/// Same as [`load`] but without the node endpoint and contract address,
/// for runs against the in-memory ledger.
pub fn load_offline() -> Result<RuntimeConfig> {
    load_inner(true)
}

fn load_inner(offline: bool) -> Result<RuntimeConfig> {
    let _ = dotenvy::dotenv();

    let (default_url, default_contract) = if offline {
        (Some("http://127.0.0.1:8545".to_string()), Some(Address::ZERO))
    } else {
        (None, None)
    };

    let rpc_url = env_str("RPC_URL", default_url).context("RPC_URL must be set")?;
    let rpc_timeout_ms = env_u64("RPC_TIMEOUT_MS", Some(10_000))?.context("RPC_TIMEOUT_MS")?;
    let rpc_max_retries = env_usize("RPC_MAX_RETRIES", Some(2))?.context("RPC_MAX_RETRIES")?;
    let rpc_backoff_ms = env_u64("RPC_BACKOFF_MS", Some(250))?.context("RPC_BACKOFF_MS")?;
    let receipt_poll_ms = env_u64("RECEIPT_POLL_MS", Some(1_000))?.context("RECEIPT_POLL_MS")?;
    let receipt_timeout_ms =
        env_u64("RECEIPT_TIMEOUT_MS", Some(120_000))?.context("RECEIPT_TIMEOUT_MS")?;

    let contract_address = env_address("CONTRACT_ADDRESS", default_contract)?
        .context("CONTRACT_ADDRESS must be set")?;
    let account_address = env_address("ACCOUNT_ADDRESS", None)?;

    let poll_period_in_secs =
        env_u64("POLL_PERIOD_IN_SECS", Some(10))?.context("POLL_PERIOD_IN_SECS")?;
    let countdown_period_in_secs =
        env_u64("COUNTDOWN_PERIOD_IN_SECS", Some(3))?.context("COUNTDOWN_PERIOD_IN_SECS")?;
    let seconds_per_block = env_u64("SECONDS_PER_BLOCK", Some(3))?.context("SECONDS_PER_BLOCK")?;
    let currency_symbol = env_str("CURRENCY_SYMBOL", Some("BDAG".to_string()))
        .context("CURRENCY_SYMBOL must be set")?;

    let log_level = env_str("LOG_LEVEL", Some("info".to_string())).context("LOG_LEVEL")?;
    let log_format = env_str("LOG_FORMAT", Some("pretty".to_string())).context("LOG_FORMAT")?;
    let log_color = env_bool("LOG_COLOR", Some(true))?.context("LOG_COLOR")?;

    Ok(RuntimeConfig {
        rpc_url,
        rpc_timeout_ms,
        rpc_max_retries,
        rpc_backoff_ms,
        receipt_poll_ms,
        receipt_timeout_ms,
        contract_address,
        account_address,
        poll_period_in_secs,
        countdown_period_in_secs,
        seconds_per_block,
        currency_symbol,
        log_level,
        log_format,
        log_color,
    })
}

fn env_str(key: &str, default: Option<String>) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty()).or(default)
}

/// The default applies only when `key` is unset or empty; a value that does
/// not parse is an error.
fn env_parse<T>(key: &str, default: Option<T>, expected: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_str(key, None) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{} must be {}, got {:?}: {}", key, expected, raw, e)),
        None => Ok(default),
    }
}

fn env_bool(key: &str, default: Option<bool>) -> Result<Option<bool>> {
    env_parse(key, default, "true or false")
}

fn env_u64(key: &str, default: Option<u64>) -> Result<Option<u64>> {
    env_parse(key, default, "a number")
}

fn env_usize(key: &str, default: Option<usize>) -> Result<Option<usize>> {
    env_parse(key, default, "a number")
}

fn env_address(key: &str, default: Option<Address>) -> Result<Option<Address>> {
    env_parse(key, default, "a 0x-prefixed address")
}
