//! Deposits into and withdrawals from a script-locked vault.
//!
//! A vault output is locked by a Plutus validator and carries a datum naming
//! the key hash of its owner. Withdrawing spends the largest vault output,
//! pays the recipient and returns everything else to the owner.

use pallas_crypto::hash::Hash;
use serde::{Deserialize, Serialize};

use crate::{
    balance, build_unsigned, min_utxo_value, model::payment_script_hash, parse_address,
    plan_payment,
    plutus::{datum_hash, decode_datum},
    select_collateral, select_script_target, vault_datum, vault_datum_owner, withdraw_redeemer,
    DraftDatum, DraftOutput, ExecutionUnits, OutputDatum, PaymentRequest, PlutusScript,
    ProtocolParameters, ScriptSpend, TransactionDraft, TxBuilderError, UnsignedTransaction,
    UnspentOutput, ValueBundle,
};

/// How a deposit attaches the vault datum to its output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatumMode {
    #[default]
    Hash,
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaultDeposit {
    pub from: String,
    pub script: PlutusScript,
    pub script_address: String,
    pub owner: Hash<28>,
    pub amount: u64,
    pub ttl: u64,
    pub fee_buffer: u64,
    pub datum_mode: DatumMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaultWithdrawal {
    pub script: PlutusScript,
    pub script_address: String,
    pub owner: Hash<28>,
    /// Receives change and collateral return, funds the collateral
    pub owner_address: String,
    pub recipient: String,
    pub amount: u64,
    pub ttl: u64,
    pub ex_units: ExecutionUnits,
    pub min_collateral: u64,
}

fn check_script_address(address: &str, script: &PlutusScript) -> Result<(), TxBuilderError> {
    let parsed = parse_address(address)?;

    if payment_script_hash(&parsed) != Some(script.hash()) {
        return Err(TxBuilderError::ScriptAddressMismatch(address.to_string()));
    }

    Ok(())
}

pub fn plan_deposit(
    deposit: &VaultDeposit,
    candidates: &[UnspentOutput],
    params: &ProtocolParameters,
) -> Result<TransactionDraft, TxBuilderError> {
    check_script_address(&deposit.script_address, &deposit.script)?;

    let datum = vault_datum(deposit.owner);

    let datum = match deposit.datum_mode {
        DatumMode::Hash => DraftDatum::Hash(datum_hash(&datum)?),
        DatumMode::Inline => DraftDatum::Inline(datum),
    };

    let request = PaymentRequest {
        from: deposit.from.clone(),
        to: deposit.script_address.clone(),
        amount: deposit.amount,
        datum: Some(datum),
        ttl: deposit.ttl,
        fee_buffer: deposit.fee_buffer,
    };

    tracing::debug!(owner = %deposit.owner, mode = ?deposit.datum_mode, "planning vault deposit");

    plan_payment(&request, candidates, params)
}

/// Checks the datum of a vault output against its owner, returning the
/// datum the witness set has to disclose.
fn resolve_datum(
    target: &UnspentOutput,
    owner: Hash<28>,
) -> Result<Option<pallas_primitives::conway::PlutusData>, TxBuilderError> {
    let expected = vault_datum(owner);

    match &target.datum {
        None => Err(TxBuilderError::MissingDatum),
        Some(OutputDatum::Hash(hash)) => {
            if *hash != datum_hash(&expected)? {
                return Err(TxBuilderError::DatumMismatch);
            }

            Ok(Some(expected))
        }
        Some(OutputDatum::Inline(bytes)) => {
            let datum = decode_datum(bytes)?;

            if vault_datum_owner(&datum) != Some(owner) {
                return Err(TxBuilderError::DatumMismatch);
            }

            Ok(None)
        }
    }
}

pub fn plan_withdrawal(
    withdrawal: &VaultWithdrawal,
    script_utxos: &[UnspentOutput],
    owner_utxos: &[UnspentOutput],
    params: &ProtocolParameters,
) -> Result<TransactionDraft, TxBuilderError> {
    check_script_address(&withdrawal.script_address, &withdrawal.script)?;

    let recipient = parse_address(&withdrawal.recipient)?;
    let owner_address = parse_address(&withdrawal.owner_address)?;

    let target = select_script_target(script_utxos)?;
    let witness_datum = resolve_datum(&target, withdrawal.owner)?;

    if target.coin() < withdrawal.amount {
        return Err(TxBuilderError::InsufficientFunds {
            required: withdrawal.amount,
            available: target.coin(),
        });
    }

    let output = DraftOutput::new(recipient, ValueBundle::lovelace(withdrawal.amount));
    let required = min_utxo_value(&output, params)?;

    if withdrawal.amount < required {
        return Err(TxBuilderError::OutputBelowMinimum {
            required,
            provided: withdrawal.amount,
        });
    }

    let collateral = select_collateral(owner_utxos, withdrawal.min_collateral, &target)?;

    tracing::debug!(target = %target, collateral = %collateral, "planning vault withdrawal");

    let spend = ScriptSpend {
        script: withdrawal.script.clone(),
        script_input: target.clone(),
        redeemer: withdraw_redeemer(withdrawal.amount)?,
        witness_datum,
        ex_units: withdrawal.ex_units,
        required_signer: withdrawal.owner,
        collateral,
        collateral_return: None,
        total_collateral: None,
    };

    let draft = TransactionDraft {
        inputs: vec![target],
        outputs: vec![output],
        fee: 0,
        ttl: withdrawal.ttl,
        script: Some(spend),
    };

    balance(draft, &owner_address, params)
}

pub fn build_deposit(
    deposit: &VaultDeposit,
    candidates: &[UnspentOutput],
    params: &ProtocolParameters,
) -> Result<UnsignedTransaction, TxBuilderError> {
    let draft = plan_deposit(deposit, candidates, params)?;
    build_unsigned(&draft, params)
}

pub fn build_withdrawal(
    withdrawal: &VaultWithdrawal,
    script_utxos: &[UnspentOutput],
    owner_utxos: &[UnspentOutput],
    params: &ProtocolParameters,
) -> Result<UnsignedTransaction, TxBuilderError> {
    let draft = plan_withdrawal(withdrawal, script_utxos, owner_utxos, params)?;
    build_unsigned(&draft, params)
}
