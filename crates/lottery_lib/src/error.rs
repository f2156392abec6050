use alloy_primitives::B256;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Node answered HTTP {0}")]
    Status(u16),
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Failed to decode contract return data: {0}")]
    Decode(#[from] alloy_sol_types::Error),
    #[error("Transaction {tx} reverted")]
    Reverted { tx: B256 },
    #[error("Transaction {tx} was not mined within {waited_ms} ms")]
    ReceiptTimeout { tx: B256, waited_ms: u64 },
    #[error("Provider exposes no account to send from")]
    NoAccount,
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl LedgerError {
    /// Errors worth retrying on the next attempt or the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_decode(),
            Self::Timeout(_) => true,
            // 4xx means a wrong URL or credentials, except for rate limiting.
            Self::Status(status) => *status >= 500 || *status == 429,
            // -32000 range is the "server error" band nodes use for lag and overload.
            Self::Rpc { code, .. } => (-32099..=-32000).contains(code) || *code == -32603,
            _ => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Decode(_))
            || matches!(self, Self::Transport(e) if e.is_decode())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_and_malformed() {
        assert!(LedgerError::Timeout(500).is_transient());
        assert!(LedgerError::Rpc {
            code: -32000,
            message: "header not found".into()
        }
        .is_transient());
        assert!(!LedgerError::Rpc {
            code: -32602,
            message: "invalid params".into()
        }
        .is_transient());

        assert!(LedgerError::Status(503).is_transient());
        assert!(LedgerError::Status(429).is_transient());
        assert!(!LedgerError::Status(401).is_transient());
        assert!(!LedgerError::Status(404).is_transient());

        let malformed = LedgerError::Malformed("empty result".into());
        assert!(malformed.is_malformed());
        assert!(!malformed.is_transient());
    }
}
