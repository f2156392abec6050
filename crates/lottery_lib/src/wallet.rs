use alloy_primitives::{Address, U256};
use tracing::info;

use crate::{
    client::{LedgerReader, LedgerWriter},
    error::LedgerError,
};

/// The connected wallet account.
///
/// Created once a provider exposes an account and dropped on disconnect; every
/// write action takes it explicitly instead of reading ambient state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub account: Address,
    pub is_owner: bool,
    pub balance: U256,
}

impl Session {
    /// Connect to `preferred` if the provider manages it, else to the first
    /// account it exposes.
    pub async fn connect<L>(ledger: &L, preferred: Option<Address>) -> Result<Self, LedgerError>
    where
        L: LedgerReader + LedgerWriter + ?Sized,
    {
        let accounts = ledger.accounts().await?;
        let account = match preferred {
            Some(wanted) if accounts.contains(&wanted) => wanted,
            Some(wanted) => {
                return Err(LedgerError::Rejected(format!(
                    "provider does not manage account {}",
                    wanted
                )))
            }
            None => *accounts.first().ok_or(LedgerError::NoAccount)?,
        };

        let owner = ledger.owner().await?;
        let balance = ledger.balance(account).await?;
        let session = Self {
            account,
            is_owner: owner == account,
            balance,
        };
        info!(account = %session.account, is_owner = session.is_owner, "wallet connected");
        Ok(session)
    }

    pub fn short_account(&self) -> String {
        short_address(&self.account)
    }
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockLedger;

    #[tokio::test]
    async fn owner_flag_follows_contract_owner() {
        let owner = Address::repeat_byte(0xaa);
        let player = Address::repeat_byte(0x01);
        let ledger = MockLedger::new(owner);
        ledger.add_account(player, U256::from(5u64));

        let session = Session::connect(&ledger, None).await.unwrap();
        assert_eq!(session.account, owner);
        assert!(session.is_owner);

        let session = Session::connect(&ledger, Some(player)).await.unwrap();
        assert!(!session.is_owner);
        assert_eq!(session.balance, U256::from(5u64));

        let err = Session::connect(&ledger, Some(Address::repeat_byte(0x77)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[test]
    fn shortens_addresses() {
        let short = short_address(&Address::repeat_byte(0x11));
        assert_eq!(short, "0x1111...1111");
    }
}
