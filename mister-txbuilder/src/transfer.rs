use crate::{
    balance, build_unsigned, min_utxo_value, parse_address, select_inputs, AssetFilter,
    DraftDatum, DraftOutput, ProtocolParameters, TransactionDraft, TxBuilderError,
    UnsignedTransaction, UnspentOutput, ValueBundle,
};

/// A lovelace payment funded by a single output of the source address.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Source address, also receiving the change
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub datum: Option<DraftDatum>,
    pub ttl: u64,
    /// Upper-bound fee estimate used to narrow candidates before the real
    /// fee is known
    pub fee_buffer: u64,
}

/// Selects an input for the payment and balances the resulting draft.
pub fn plan_payment(
    request: &PaymentRequest,
    candidates: &[UnspentOutput],
    params: &ProtocolParameters,
) -> Result<TransactionDraft, TxBuilderError> {
    let to = parse_address(&request.to)?;
    let change = parse_address(&request.from)?;

    let mut output = DraftOutput::new(to, ValueBundle::lovelace(request.amount));

    if let Some(datum) = &request.datum {
        output = output.with_datum(datum.clone());
    }

    let required = min_utxo_value(&output, params)?;

    if request.amount < required {
        return Err(TxBuilderError::OutputBelowMinimum {
            required,
            provided: request.amount,
        });
    }

    let target = request
        .amount
        .checked_add(request.fee_buffer)
        .ok_or(TxBuilderError::ValueOverflow)?;

    let inputs = select_inputs(candidates, target, AssetFilter::CoinOnly)?;

    let draft = TransactionDraft {
        inputs,
        outputs: vec![output],
        fee: 0,
        ttl: request.ttl,
        script: None,
    };

    balance(draft, &change, params)
}

/// Builds the unsigned bytes of a plain transfer.
pub fn build_transfer(
    request: &PaymentRequest,
    candidates: &[UnspentOutput],
    params: &ProtocolParameters,
) -> Result<UnsignedTransaction, TxBuilderError> {
    let draft = plan_payment(request, candidates, params)?;
    build_unsigned(&draft, params)
}
