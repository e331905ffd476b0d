//! Transaction construction for plain transfers and script-locked vaults.
//!
//! The crate is pure: it never talks to the network. Callers feed it a
//! snapshot of protocol parameters and candidate UTxOs, and get back either
//! unsigned Conway transaction bytes ready for an external signer, or a
//! signed transaction assembled from a wallet-provided witness set.

use thiserror::Error;

mod conway;
mod fee;
mod model;
mod plutus;
mod scriptdata;
mod select;
mod transfer;
mod vault;
mod witness;

#[cfg(test)]
mod testing;

pub mod prelude;

pub use conway::{build_unsigned, reencode};
pub use fee::{balance, compute_fee, linear_fee, min_collateral, min_utxo_value, script_fee};
pub use model::*;
pub use plutus::{vault_datum, vault_datum_owner, withdraw_redeemer};
pub use select::{select_collateral, select_inputs, select_script_target, AssetFilter};
pub use transfer::{build_transfer, plan_payment, PaymentRequest};
pub use vault::{
    build_deposit, build_withdrawal, plan_deposit, plan_withdrawal, DatumMode, VaultDeposit,
    VaultWithdrawal,
};
pub use witness::combine;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxBuilderError {
    /// The source address holds no UTxO at all
    #[error("no utxo available at the source address")]
    NoUtxoAtSource,

    /// No single candidate covers the required amount
    #[error("insufficient funds: {required} lovelace required, best candidate holds {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("malformed address {0}")]
    MalformedAddress(String),

    /// The payment credential of a vault address is not the vault script
    #[error("address {0} is not locked by the vault script")]
    ScriptAddressMismatch(String),

    #[error("malformed asset unit {0}")]
    MalformedAssetUnit(String),

    #[error("output holds {provided} lovelace, below the minimum of {required}")]
    OutputBelowMinimum { required: u64, provided: u64 },

    #[error("serialized transaction size {size} exceeds the maximum of {max}")]
    SerializedSizeExceedsMax { size: u64, max: u64 },

    #[error("serialized output value size {size} exceeds the maximum of {max}")]
    ValueSizeExceedsMax { size: u64, max: u64 },

    /// The built transaction has no given inputs
    #[error("transaction has no inputs")]
    NoInputs,

    /// The built transaction has no outputs
    #[error("transaction has no outputs")]
    NoOutputs,

    /// Inputs don't equal outputs plus fee for at least one asset unit
    #[error("transaction does not preserve value")]
    Unbalanced,

    #[error("fee did not settle: {required} required, {fee} available")]
    FeeNotSettled { required: u64, fee: u64 },

    #[error("value arithmetic overflow")]
    ValueOverflow,

    #[error("script spend requires a pure-lovelace collateral input")]
    MissingCollateral,

    /// Collateral holds tokens or is the very input being spent
    #[error("collateral input {0} is not usable")]
    InvalidCollateral(String),

    #[error("collateral holds {provided} lovelace, {required} required")]
    InsufficientCollateral { required: u64, provided: u64 },

    #[error("script output carries no datum")]
    MissingDatum,

    #[error("datum does not match the commitment of the script output")]
    DatumMismatch,

    /// The input targeted by the spend redeemer is not part of the inputs
    #[error("redeemer target is not a transaction input")]
    RedeemerTargetMissing,

    #[error("protocol parameters carry no cost model for {0:?}")]
    MissingCostModel(PlutusVersion),

    #[error("time-to-live slot {ttl} does not exceed the chain tip {tip}")]
    ExpiredTtl { ttl: u64, tip: u64 },

    #[error("malformed witness set: {0}")]
    MalformedWitnessSet(String),

    #[error("signature of key {0} does not verify against the transaction id")]
    InvalidSignature(String),

    #[error("required signer {0} has not signed")]
    MissingRequiredSigner(String),

    #[error("corrupted transaction bytes: {0}")]
    CorruptedTxBytes(String),

    #[error("malformed datum: {0}")]
    MalformedDatum(String),

    /// The transaction can not be encoded to CBOR.
    #[error("transaction can not be encoded")]
    UnencodableTransaction,
}

/// Checks that a time-to-live slot is still ahead of the chain tip.
pub fn check_ttl(ttl: u64, tip: u64) -> Result<(), TxBuilderError> {
    if ttl <= tip {
        return Err(TxBuilderError::ExpiredTtl { ttl, tip });
    }

    Ok(())
}
