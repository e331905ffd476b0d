use std::collections::{BTreeMap, BTreeSet};

use pallas_codec::{
    minicbor,
    utils::{Bytes, CborWrap, MaybeIndefArray},
};
use pallas_crypto::hash::Hash;
use pallas_primitives::{
    conway::{
        DatumOption, ExUnits, MintedTx, PlutusScript as PallasScript, PostAlonzoTransactionOutput,
        PseudoTransactionOutput, Redeemer, RedeemerTag, Redeemers, TransactionBody,
        TransactionInput, TransactionOutput, Tx, VKeyWitness, Value, WitnessSet,
    },
    Fragment, NonEmptyKeyValuePairs, NonEmptySet, PositiveCoin, Set,
};
use pallas_traverse::ComputeHash;

use crate::{
    fee, model::payment_key_hash, model::payment_script_hash, parse_address, scriptdata,
    DraftDatum, DraftOutput, PlutusVersion, ProtocolParameters, TransactionDraft,
    TxBuilderError, UnsignedTransaction, UnspentOutput, ValueBundle,
};

/// Hex length of a policy id prefixing an asset unit
const POLICY_HEX_LEN: usize = 56;

const VKEY_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;

fn build_input(utxo: &UnspentOutput) -> TransactionInput {
    TransactionInput {
        transaction_id: utxo.tx_hash,
        index: utxo.output_index,
    }
}

fn build_value(value: &ValueBundle) -> Result<Value, TxBuilderError> {
    let mut policies: BTreeMap<Hash<28>, Vec<(Bytes, PositiveCoin)>> = BTreeMap::new();

    for (unit, quantity) in value.assets() {
        let malformed = || TxBuilderError::MalformedAssetUnit(unit.to_string());

        if unit.len() < POLICY_HEX_LEN || !unit.is_char_boundary(POLICY_HEX_LEN) {
            return Err(malformed());
        }

        let (policy, name) = unit.split_at(POLICY_HEX_LEN);

        let policy: [u8; 28] = hex::decode(policy)
            .map_err(|_| malformed())?
            .try_into()
            .map_err(|_| malformed())?;

        let name = hex::decode(name).map_err(|_| malformed())?;

        let quantity = PositiveCoin::try_from(quantity).map_err(|_| malformed())?;

        policies
            .entry(Hash::new(policy))
            .or_default()
            .push((name.into(), quantity));
    }

    let assets = policies
        .into_iter()
        .map(|(policy, assets)| {
            NonEmptyKeyValuePairs::from_vec(assets)
                .map(|x| (policy, x))
                .ok_or(TxBuilderError::ValueOverflow)
        })
        .collect::<Result<Vec<_>, _>>()?;

    match NonEmptyKeyValuePairs::from_vec(assets) {
        Some(assets) => Ok(Value::Multiasset(value.coin(), assets)),
        None => Ok(Value::Coin(value.coin())),
    }
}

pub(crate) fn build_output(output: &DraftOutput) -> Result<TransactionOutput, TxBuilderError> {
    let datum_option = match &output.datum {
        Some(DraftDatum::Hash(hash)) => Some(DatumOption::Hash(*hash)),
        Some(DraftDatum::Inline(data)) => Some(DatumOption::Data(CborWrap(data.clone()))),
        None => None,
    };

    Ok(PseudoTransactionOutput::PostAlonzo(
        PostAlonzoTransactionOutput {
            address: output.address.to_vec().into(),
            value: build_value(&output.value)?,
            datum_option,
            script_ref: None,
        },
    ))
}

/// Serialized size of a single output
pub(crate) fn output_size(output: &DraftOutput) -> Result<u64, TxBuilderError> {
    let output = build_output(output)?;

    output
        .encode_fragment()
        .map(|x| x.len() as u64)
        .map_err(|_| TxBuilderError::UnencodableTransaction)
}

pub(crate) fn value_size(value: &ValueBundle) -> Result<u64, TxBuilderError> {
    let value = build_value(value)?;

    minicbor::to_vec(&value)
        .map(|x| x.len() as u64)
        .map_err(|_| TxBuilderError::UnencodableTransaction)
}

/// Distinct payment keys expected to sign the draft
pub(crate) fn expected_signers(draft: &TransactionDraft) -> Result<BTreeSet<Hash<28>>, TxBuilderError> {
    let mut keys = BTreeSet::new();

    let spent = draft
        .inputs
        .iter()
        .chain(draft.script.as_ref().map(|x| &x.collateral));

    for utxo in spent {
        if let Some(key) = payment_key_hash(&parse_address(&utxo.address)?) {
            keys.insert(key);
        }
    }

    if let Some(script) = &draft.script {
        keys.insert(script.required_signer);
    }

    Ok(keys)
}

fn placeholder_witnesses(count: usize) -> Option<NonEmptySet<VKeyWitness>> {
    let witnesses = (0..count)
        .map(|i| VKeyWitness {
            // distinct keys so the set keeps one entry per signer
            vkey: Bytes::from(vec![i as u8; VKEY_SIZE]),
            signature: Bytes::from(vec![0u8; SIGNATURE_SIZE]),
        })
        .collect();

    NonEmptySet::from_vec(witnesses)
}

fn assemble(
    draft: &TransactionDraft,
    params: &ProtocolParameters,
    placeholder_signers: usize,
) -> Result<Tx, TxBuilderError> {
    let mut inputs = draft.inputs.iter().map(build_input).collect::<Vec<_>>();

    inputs.sort_unstable_by_key(|x| (x.transaction_id, x.index));

    let outputs = draft
        .outputs
        .iter()
        .map(build_output)
        .collect::<Result<Vec<_>, _>>()?;

    let mut witness_set = WitnessSet {
        vkeywitness: None,
        native_script: None,
        bootstrap_witness: None,
        plutus_v1_script: None,
        plutus_v2_script: None,
        plutus_v3_script: None,
        plutus_data: None,
        redeemer: None,
    };

    let mut body = TransactionBody {
        inputs: Set::from(inputs),
        outputs,
        ttl: Some(draft.ttl),
        validity_interval_start: None,
        fee: draft.fee,
        certificates: None,
        withdrawals: None,
        auxiliary_data_hash: None,
        mint: None,
        script_data_hash: None,
        collateral: None,
        required_signers: None,
        network_id: None,
        collateral_return: None,
        reference_inputs: None,
        total_collateral: None,
        voting_procedures: None,
        proposal_procedures: None,
        treasury_value: None,
        donation: None,
    };

    if let Some(spend) = &draft.script {
        let target = build_input(&spend.script_input);

        let index = body
            .inputs
            .iter()
            .position(|x| *x == target)
            .ok_or(TxBuilderError::RedeemerTargetMissing)? as u32;

        let redeemers = Redeemers::List(MaybeIndefArray::Def(vec![Redeemer {
            tag: RedeemerTag::Spend,
            index,
            data: spend.redeemer.clone(),
            ex_units: ExUnits {
                mem: spend.ex_units.mem,
                steps: spend.ex_units.steps,
            },
        }]));

        let script_bytes = Bytes::from(spend.script.bytes.clone());

        match spend.script.version {
            PlutusVersion::V1 => {
                witness_set.plutus_v1_script = NonEmptySet::from_vec(vec![PallasScript::<1>(script_bytes)])
            }
            PlutusVersion::V2 => {
                witness_set.plutus_v2_script = NonEmptySet::from_vec(vec![PallasScript::<2>(script_bytes)])
            }
            PlutusVersion::V3 => {
                witness_set.plutus_v3_script = NonEmptySet::from_vec(vec![PallasScript::<3>(script_bytes)])
            }
        }

        witness_set.plutus_data = spend
            .witness_datum
            .clone()
            .and_then(|x| NonEmptySet::from_vec(vec![x]));

        witness_set.redeemer = Some(redeemers);

        let cost_model = params
            .cost_models
            .get(&spend.script.version)
            .ok_or(TxBuilderError::MissingCostModel(spend.script.version))?;

        let raw_witness_set =
            minicbor::to_vec(&witness_set).map_err(|_| TxBuilderError::UnencodableTransaction)?;

        body.script_data_hash = Some(scriptdata::script_data_hash(
            &raw_witness_set,
            spend.script.version,
            cost_model,
        )?);

        body.collateral = NonEmptySet::from_vec(vec![build_input(&spend.collateral)]);
        body.required_signers = NonEmptySet::from_vec(vec![spend.required_signer]);
        body.collateral_return = spend.collateral_return.as_ref().map(build_output).transpose()?;
        body.total_collateral = spend.total_collateral;
    }

    witness_set.vkeywitness = placeholder_witnesses(placeholder_signers);

    Ok(Tx {
        transaction_body: body,
        transaction_witness_set: witness_set,
        success: true,
        auxiliary_data: None.into(),
    })
}

/// Size of the draft once every expected signer has added a witness.
pub(crate) fn signed_size(
    draft: &TransactionDraft,
    params: &ProtocolParameters,
) -> Result<u64, TxBuilderError> {
    let signers = expected_signers(draft)?.len();

    assemble(draft, params, signers)?
        .encode_fragment()
        .map(|x| x.len() as u64)
        .map_err(|_| TxBuilderError::UnencodableTransaction)
}

fn check_outputs(draft: &TransactionDraft, params: &ProtocolParameters) -> Result<(), TxBuilderError> {
    let collateral_return = draft.script.as_ref().and_then(|x| x.collateral_return.as_ref());

    for output in draft.outputs.iter().chain(collateral_return) {
        let size = value_size(&output.value)?;

        if size > params.max_value_size {
            return Err(TxBuilderError::ValueSizeExceedsMax {
                size,
                max: params.max_value_size,
            });
        }

        let required = fee::min_utxo_value(output, params)?;

        if output.value.coin() < required {
            return Err(TxBuilderError::OutputBelowMinimum {
                required,
                provided: output.value.coin(),
            });
        }
    }

    Ok(())
}

fn check_script(draft: &TransactionDraft) -> Result<(), TxBuilderError> {
    let Some(spend) = &draft.script else {
        return Ok(());
    };

    if !draft.inputs.iter().any(|x| x.same_output(&spend.script_input)) {
        return Err(TxBuilderError::RedeemerTargetMissing);
    }

    let script_address = parse_address(&spend.script_input.address)?;

    if payment_script_hash(&script_address) != Some(spend.script.hash()) {
        return Err(TxBuilderError::ScriptAddressMismatch(
            spend.script_input.address.clone(),
        ));
    }

    let collateral = &spend.collateral;

    if !collateral.value.is_pure_coin() || draft.inputs.iter().any(|x| x.same_output(collateral)) {
        return Err(TxBuilderError::InvalidCollateral(collateral.to_string()));
    }

    let pledged = spend.total_collateral.unwrap_or(collateral.coin());
    let returned = spend
        .collateral_return
        .as_ref()
        .map(|x| x.value.coin())
        .unwrap_or_default();

    if pledged.checked_add(returned) != Some(collateral.coin()) {
        return Err(TxBuilderError::InvalidCollateral(collateral.to_string()));
    }

    Ok(())
}

/// Validates a balanced draft and encodes it as an unsigned Conway
/// transaction.
///
/// The encoding carries no verification-key witnesses, the fee already
/// accounts for them.
pub fn build_unsigned(
    draft: &TransactionDraft,
    params: &ProtocolParameters,
) -> Result<UnsignedTransaction, TxBuilderError> {
    if draft.inputs.is_empty() {
        return Err(TxBuilderError::NoInputs);
    }

    if draft.outputs.is_empty() {
        return Err(TxBuilderError::NoOutputs);
    }

    if !draft.is_balanced() {
        return Err(TxBuilderError::Unbalanced);
    }

    check_outputs(draft, params)?;
    check_script(draft)?;

    if let Some(spend) = &draft.script {
        let required = fee::min_collateral(draft.fee, params);
        let provided = spend.total_collateral.unwrap_or(spend.collateral.coin());

        if provided < required {
            return Err(TxBuilderError::InsufficientCollateral { required, provided });
        }
    }

    let required = fee::compute_fee(draft, params)?;

    if draft.fee < required {
        return Err(TxBuilderError::FeeNotSettled {
            required,
            fee: draft.fee,
        });
    }

    let size = signed_size(draft, params)?;

    if size > params.max_tx_size {
        return Err(TxBuilderError::SerializedSizeExceedsMax {
            size,
            max: params.max_tx_size,
        });
    }

    let tx = assemble(draft, params, 0)?;

    let bytes = tx
        .encode_fragment()
        .map_err(|_| TxBuilderError::UnencodableTransaction)?;

    let tx_hash = tx.transaction_body.compute_hash();

    tracing::info!(%tx_hash, size = bytes.len(), fee = draft.fee, "built unsigned transaction");

    Ok(UnsignedTransaction { tx_hash, bytes })
}

/// Decodes transaction bytes while keeping the original encoding of every
/// component, then encodes them again.
pub fn reencode(bytes: &[u8]) -> Result<Vec<u8>, TxBuilderError> {
    let tx: MintedTx = minicbor::decode(bytes)
        .map_err(|e| TxBuilderError::CorruptedTxBytes(e.to_string()))?;

    minicbor::to_vec(&tx).map_err(|_| TxBuilderError::UnencodableTransaction)
}
