use pallas_addresses::Address;

use crate::{
    conway, DraftOutput, ExecutionUnits, ProtocolParameters, TransactionDraft, TxBuilderError,
    ValueBundle,
};

/// Bytes the ledger adds to every output when sizing it for the minimum value
pub const UTXO_ENTRY_OVERHEAD: u64 = 160;

/// Sizing passes before the fee is settled by lowering change
const SIZING_PASSES: usize = 2;

pub fn linear_fee(size: u64, params: &ProtocolParameters) -> u64 {
    params
        .min_fee_a
        .saturating_mul(size)
        .saturating_add(params.min_fee_b)
}

/// Execution cost of a script budget, rounded up to the next lovelace.
pub fn script_fee(units: &ExecutionUnits, params: &ProtocolParameters) -> u64 {
    let (pm, ps) = (params.price_mem, params.price_step);

    let numerator = pm.numerator as u128 * units.mem as u128 * ps.denominator as u128
        + ps.numerator as u128 * units.steps as u128 * pm.denominator as u128;
    let denominator = pm.denominator as u128 * ps.denominator as u128;

    u64::try_from(numerator.div_ceil(denominator)).unwrap_or(u64::MAX)
}

/// Lowest lovelace quantity the ledger accepts for `output`
pub fn min_utxo_value(output: &DraftOutput, params: &ProtocolParameters) -> Result<u64, TxBuilderError> {
    let size = conway::output_size(output)?;

    params
        .coins_per_utxo_byte
        .checked_mul(UTXO_ENTRY_OVERHEAD + size)
        .ok_or(TxBuilderError::ValueOverflow)
}

/// Collateral the ledger requires for a script transaction paying `fee`
pub fn min_collateral(fee: u64, params: &ProtocolParameters) -> u64 {
    let required = (fee as u128 * params.collateral_percent as u128).div_ceil(100);
    u64::try_from(required).unwrap_or(u64::MAX)
}

/// Fee the draft must pay once every expected signer has witnessed it.
pub fn compute_fee(draft: &TransactionDraft, params: &ProtocolParameters) -> Result<u64, TxBuilderError> {
    let size = conway::signed_size(draft, params)?;

    let scripts = draft
        .script
        .as_ref()
        .map(|x| script_fee(&x.ex_units, params))
        .unwrap_or_default();

    Ok(linear_fee(size, params).saturating_add(scripts))
}

fn insufficient(draft: &TransactionDraft, fee: u64) -> TxBuilderError {
    let required = draft
        .outputs
        .iter()
        .filter(|x| !x.is_change)
        .fold(fee, |acc, x| acc.saturating_add(x.value.coin()));

    let available = draft.inputs.iter().map(|x| x.coin()).sum();

    TxBuilderError::InsufficientFunds {
        required,
        available,
    }
}

/// Sets the change output for `fee`, folding dust change into the fee.
fn apply_change(
    draft: &mut TransactionDraft,
    surplus: &ValueBundle,
    fee: u64,
    change_address: &Address,
    params: &ProtocolParameters,
) -> Result<(), TxBuilderError> {
    draft.outputs.retain(|x| !x.is_change);

    let change = surplus
        .checked_sub(&ValueBundle::lovelace(fee))
        .ok_or_else(|| insufficient(draft, fee))?;

    if change == ValueBundle::new() {
        draft.fee = fee;
        return Ok(());
    }

    let output = DraftOutput::change(change_address.clone(), change);
    let required = min_utxo_value(&output, params)?;

    if output.value.coin() >= required {
        draft.outputs.push(output);
        draft.fee = fee;
        return Ok(());
    }

    if !output.value.is_pure_coin() {
        return Err(TxBuilderError::OutputBelowMinimum {
            required,
            provided: output.value.coin(),
        });
    }

    tracing::debug!(dust = output.value.coin(), "folding change into fee");
    draft.fee = surplus.coin();

    Ok(())
}

/// Pledges collateral for the current fee, returning the remainder to the
/// owner when it clears the minimum.
fn apply_collateral(
    draft: &mut TransactionDraft,
    params: &ProtocolParameters,
) -> Result<(), TxBuilderError> {
    let fee = draft.fee;

    let Some(spend) = draft.script.as_mut() else {
        return Ok(());
    };

    let required = min_collateral(fee, params);
    let provided = spend.collateral.coin();

    if provided < required {
        return Err(TxBuilderError::InsufficientCollateral { required, provided });
    }

    let owner = crate::parse_address(&spend.collateral.address)?;
    let output = DraftOutput::change(owner, ValueBundle::lovelace(provided - required));

    if provided > required && output.value.coin() >= min_utxo_value(&output, params)? {
        spend.collateral_return = Some(output);
        spend.total_collateral = Some(required);
    } else {
        spend.collateral_return = None;
        spend.total_collateral = Some(provided);
    }

    Ok(())
}

/// Balances a draft whose inputs and payment outputs are set.
///
/// Runs a bounded number of sizing passes, then settles on the first fee
/// that covers the computed requirement. The fee may exceed the
/// requirement only by dust folded out of the change.
pub fn balance(
    mut draft: TransactionDraft,
    change_address: &Address,
    params: &ProtocolParameters,
) -> Result<TransactionDraft, TxBuilderError> {
    draft.outputs.retain(|x| !x.is_change);

    let consumed = draft.input_total().ok_or(TxBuilderError::ValueOverflow)?;
    let produced = draft.output_total().ok_or(TxBuilderError::ValueOverflow)?;

    let surplus = consumed
        .checked_sub(&produced)
        .ok_or_else(|| insufficient(&draft, 0))?;

    // placeholder fee wide enough to never shrink the encoding later
    let mut fee = linear_fee(params.max_tx_size, params).min(surplus.coin());

    for pass in 0..SIZING_PASSES {
        apply_change(&mut draft, &surplus, fee, change_address, params)?;
        apply_collateral(&mut draft, params)?;

        fee = compute_fee(&draft, params)?;
        tracing::debug!(pass, fee, "sizing pass");
    }

    // settle: only ever lower the change, never grow the encoding
    for _ in 0..SIZING_PASSES {
        apply_change(&mut draft, &surplus, fee, change_address, params)?;
        apply_collateral(&mut draft, params)?;

        let required = compute_fee(&draft, params)?;

        if draft.fee >= required {
            tracing::debug!(fee = draft.fee, required, "fee settled");
            return Ok(draft);
        }

        fee = required;
    }

    Err(TxBuilderError::FeeNotSettled {
        required: compute_fee(&draft, params)?,
        fee: draft.fee,
    })
}
