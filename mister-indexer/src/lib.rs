//! Chain queries and transaction submission through a blockchain indexer.
//!
//! [`Indexer`] is the seam the pipeline talks to. [`BlockfrostClient`] is the
//! HTTP implementation against a Blockfrost-compatible API.

use async_trait::async_trait;
use mister_txbuilder::{ProtocolParameters, UnspentOutput};
use pallas_crypto::hash::Hash;
use thiserror::Error;

mod blockfrost;
mod dto;

pub use blockfrost::{BlockfrostClient, BlockfrostConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Non-success status from the indexer
    #[error("indexer unavailable: {0}")]
    Unavailable(String),

    #[error("indexer request timed out")]
    Timeout,

    /// The request never got an answer: refused, reset or unresolved
    #[error("indexer unreachable: {0}")]
    Transport(String),

    /// The node refused the transaction, carrying its diagnostic unchanged
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("unexpected indexer payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Error::Timeout
        } else if value.is_decode() {
            Error::Decode(value.to_string())
        } else if value.is_connect() || value.is_request() {
            Error::Transport(value.to_string())
        } else {
            Error::Unavailable(value.to_string())
        }
    }
}

/// Read and submit access to the chain.
///
/// Every call hits the indexer, nothing is cached between calls.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn protocol_parameters(&self) -> Result<ProtocolParameters, Error>;

    /// Slot of the latest block
    async fn tip_slot(&self) -> Result<u64, Error>;

    /// Unspent outputs at `address`, empty when the address was never used
    async fn utxos(&self, address: &str) -> Result<Vec<UnspentOutput>, Error>;

    /// Submits a signed transaction, returning its id as echoed by the node
    async fn submit(&self, tx: &[u8]) -> Result<Hash<32>, Error>;
}
