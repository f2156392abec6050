pub mod abi;
pub mod client;
pub mod error;
pub mod types;
pub mod wallet;

pub use error::LedgerError;
