use crate::{TxBuilderError, UnspentOutput};

/// Which candidates may fund a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFilter {
    /// Only outputs holding nothing but lovelace
    CoinOnly,
    Any,
}

impl AssetFilter {
    fn accepts(&self, utxo: &UnspentOutput) -> bool {
        match self {
            AssetFilter::CoinOnly => utxo.value.is_pure_coin(),
            AssetFilter::Any => true,
        }
    }
}

/// Picks the first candidate, in the order given, that covers `required`
/// lovelace on its own.
///
/// Selection is deterministic: the same candidates and amount always yield
/// the same input.
pub fn select_inputs(
    candidates: &[UnspentOutput],
    required: u64,
    filter: AssetFilter,
) -> Result<Vec<UnspentOutput>, TxBuilderError> {
    if candidates.is_empty() {
        return Err(TxBuilderError::NoUtxoAtSource);
    }

    let eligible = || candidates.iter().filter(|x| filter.accepts(x));

    if let Some(found) = eligible().find(|x| x.coin() >= required) {
        tracing::debug!(input = %found, required, "selected input");
        return Ok(vec![found.clone()]);
    }

    let available = eligible().map(|x| x.coin()).max().unwrap_or_default();

    Err(TxBuilderError::InsufficientFunds {
        required,
        available,
    })
}

/// Picks the script output holding the most lovelace, the first one on ties.
pub fn select_script_target(candidates: &[UnspentOutput]) -> Result<UnspentOutput, TxBuilderError> {
    let mut best: Option<&UnspentOutput> = None;

    for candidate in candidates {
        match best {
            Some(b) if b.coin() >= candidate.coin() => (),
            _ => best = Some(candidate),
        }
    }

    best.cloned().ok_or(TxBuilderError::NoUtxoAtSource)
}

/// Picks a pure-lovelace output holding at least `min` to serve as
/// collateral, never the output being spent by the script.
pub fn select_collateral(
    candidates: &[UnspentOutput],
    min: u64,
    exclude: &UnspentOutput,
) -> Result<UnspentOutput, TxBuilderError> {
    candidates
        .iter()
        .filter(|x| !x.same_output(exclude))
        .filter(|x| x.value.is_pure_coin())
        .find(|x| x.coin() >= min)
        .cloned()
        .ok_or(TxBuilderError::MissingCollateral)
}
