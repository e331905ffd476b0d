use std::{collections::BTreeMap, fmt};

use pallas_addresses::{Address, ShelleyPaymentPart};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::conway::PlutusData;
use serde::{Deserialize, Serialize};

use crate::TxBuilderError;

/// Unit of the native coin inside a [`ValueBundle`]
pub const LOVELACE: &str = "lovelace";

/// Quantities keyed by asset unit.
///
/// Non-native units follow the indexer convention of the hex policy id
/// followed by the hex asset name. Zero quantities are never stored, so two
/// bundles holding the same amounts always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBundle(BTreeMap<String, u64>);

impl ValueBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lovelace(amount: u64) -> Self {
        Self::new().with(LOVELACE, amount)
    }

    pub fn with(mut self, unit: impl Into<String>, quantity: u64) -> Self {
        let unit = unit.into();

        if quantity == 0 {
            self.0.remove(&unit);
        } else {
            self.0.insert(unit, quantity);
        }

        self
    }

    pub fn coin(&self) -> u64 {
        self.quantity(LOVELACE)
    }

    pub fn quantity(&self, unit: &str) -> u64 {
        self.0.get(unit).copied().unwrap_or_default()
    }

    /// True when the bundle holds nothing but the native coin
    pub fn is_pure_coin(&self) -> bool {
        self.0.keys().all(|unit| unit == LOVELACE)
    }

    /// Non-native units and their quantities
    pub fn assets(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0
            .iter()
            .filter(|(unit, _)| unit.as_str() != LOVELACE)
            .map(|(unit, q)| (unit.as_str(), *q))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(unit, q)| (unit.as_str(), *q))
    }

    pub fn checked_add(&self, other: &ValueBundle) -> Option<ValueBundle> {
        let mut out = self.clone();

        for (unit, q) in other.iter() {
            let sum = out.quantity(unit).checked_add(q)?;
            out = out.with(unit, sum);
        }

        Some(out)
    }

    /// Subtracts unit by unit, `None` if any unit would go negative
    pub fn checked_sub(&self, other: &ValueBundle) -> Option<ValueBundle> {
        let mut out = self.clone();

        for (unit, q) in other.iter() {
            let diff = out.quantity(unit).checked_sub(q)?;
            out = out.with(unit, diff);
        }

        Some(out)
    }

    pub fn sum<'a>(values: impl IntoIterator<Item = &'a ValueBundle>) -> Option<ValueBundle> {
        values
            .into_iter()
            .try_fold(ValueBundle::new(), |acc, v| acc.checked_add(v))
    }
}

/// Datum attached to an output observed on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDatum {
    Hash(Hash<32>),
    /// CBOR of the inline plutus data
    Inline(Vec<u8>),
}

/// An output observed by the indexer and not yet spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub tx_hash: Hash<32>,
    pub output_index: u64,
    pub address: String,
    pub value: ValueBundle,
    pub datum: Option<OutputDatum>,
}

impl UnspentOutput {
    pub fn new(tx_hash: Hash<32>, output_index: u64, address: impl Into<String>, value: ValueBundle) -> Self {
        Self {
            tx_hash,
            output_index,
            address: address.into(),
            value,
            datum: None,
        }
    }

    pub fn with_datum(mut self, datum: OutputDatum) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn coin(&self) -> u64 {
        self.value.coin()
    }

    /// True when both values reference the same on-chain output
    pub fn same_output(&self, other: &UnspentOutput) -> bool {
        self.tx_hash == other.tx_hash && self.output_index == other.output_index
    }
}

impl fmt::Display for UnspentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

/// An exact non-negative ratio, as used by the ledger for execution prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: u64,
    pub denominator: u64,
}

impl Rational {
    pub fn new(numerator: u64, denominator: u64) -> Option<Self> {
        (denominator != 0).then_some(Self {
            numerator,
            denominator,
        })
    }

    /// Parses a decimal such as `0.0577` or `7.21e-5` without going
    /// through floats.
    pub fn from_decimal(value: &str) -> Option<Self> {
        let value = value.trim();

        let (mantissa, exponent) = match value.split_once(['e', 'E']) {
            Some((m, e)) => (m, e.parse::<i32>().ok()?),
            None => (value, 0),
        };

        let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));

        if int.is_empty() && frac.is_empty() {
            return None;
        }

        if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }

        let frac = frac.trim_end_matches('0');
        let digits = format!("{int}{frac}");
        let digits = digits.trim_start_matches('0');

        let numerator: u64 = if digits.is_empty() {
            0
        } else {
            digits.parse().ok()?
        };

        let scale = i32::try_from(frac.len()).ok()?.checked_sub(exponent)?;

        if scale >= 0 {
            Self::new(numerator, 10u64.checked_pow(scale as u32)?)
        } else {
            Self::new(numerator.checked_mul(10u64.checked_pow(scale.unsigned_abs())?)?, 1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlutusVersion {
    V1,
    V2,
    V3,
}

impl PlutusVersion {
    /// Prefix byte used when hashing a script of this language
    pub fn hash_tag(&self) -> u8 {
        match self {
            PlutusVersion::V1 => 1,
            PlutusVersion::V2 => 2,
            PlutusVersion::V3 => 3,
        }
    }

    /// Language id used as the key of cost models and language views
    pub fn language_id(&self) -> u8 {
        match self {
            PlutusVersion::V1 => 0,
            PlutusVersion::V2 => 1,
            PlutusVersion::V3 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlutusScript {
    pub version: PlutusVersion,
    pub bytes: Vec<u8>,
}

impl PlutusScript {
    pub fn new(version: PlutusVersion, bytes: Vec<u8>) -> Self {
        Self { version, bytes }
    }

    pub fn hash(&self) -> Hash<28> {
        Hasher::<224>::hash_tagged(&self.bytes, self.version.hash_tag())
    }
}

/// Snapshot of the ledger protocol parameters relevant to building.
///
/// A fresh snapshot is fetched for every build, nothing here is ever
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParameters {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub coins_per_utxo_byte: u64,
    pub max_value_size: u64,
    pub max_tx_size: u64,
    pub pool_deposit: u64,
    pub key_deposit: u64,
    pub price_mem: Rational,
    pub price_step: Rational,
    pub collateral_percent: u64,
    pub max_collateral_inputs: u64,
    pub cost_models: BTreeMap<PlutusVersion, Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnits {
    pub mem: u64,
    pub steps: u64,
}

/// Datum carried by an output under construction
#[derive(Debug, Clone, PartialEq)]
pub enum DraftDatum {
    Hash(Hash<32>),
    Inline(PlutusData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftOutput {
    pub address: Address,
    pub value: ValueBundle,
    pub datum: Option<DraftDatum>,
    pub is_change: bool,
}

impl DraftOutput {
    pub fn new(address: Address, value: ValueBundle) -> Self {
        Self {
            address,
            value,
            datum: None,
            is_change: false,
        }
    }

    pub fn change(address: Address, value: ValueBundle) -> Self {
        Self {
            is_change: true,
            ..Self::new(address, value)
        }
    }

    pub fn with_datum(mut self, datum: DraftDatum) -> Self {
        self.datum = Some(datum);
        self
    }
}

/// Everything a script-locked input needs besides the input itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSpend {
    pub script: PlutusScript,
    pub script_input: UnspentOutput,
    pub redeemer: PlutusData,
    /// Datum to disclose in the witness set, only when the output commits to a hash
    pub witness_datum: Option<PlutusData>,
    pub ex_units: ExecutionUnits,
    pub required_signer: Hash<28>,
    pub collateral: UnspentOutput,
    pub collateral_return: Option<DraftOutput>,
    pub total_collateral: Option<u64>,
}

/// A transaction under construction, owned by a single build call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub inputs: Vec<UnspentOutput>,
    pub outputs: Vec<DraftOutput>,
    pub fee: u64,
    pub ttl: u64,
    pub script: Option<ScriptSpend>,
}

impl TransactionDraft {
    pub fn input_total(&self) -> Option<ValueBundle> {
        ValueBundle::sum(self.inputs.iter().map(|x| &x.value))
    }

    pub fn output_total(&self) -> Option<ValueBundle> {
        ValueBundle::sum(self.outputs.iter().map(|x| &x.value))
    }

    /// Inputs equal outputs plus fee, for every unit
    pub fn is_balanced(&self) -> bool {
        let consumed = self.input_total();
        let produced = self
            .output_total()
            .and_then(|x| x.checked_add(&ValueBundle::lovelace(self.fee)));

        match (consumed, produced) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn change_output(&self) -> Option<&DraftOutput> {
        self.outputs.iter().find(|x| x.is_change)
    }
}

/// Unsigned transaction bytes, the surface handed to an external signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub tx_hash: Hash<32>,
    pub bytes: Vec<u8>,
}

impl UnsignedTransaction {
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// Transaction with its complete witness set, ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx_hash: Hash<32>,
    pub bytes: Vec<u8>,
}

impl SignedTransaction {
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

pub fn parse_address(value: &str) -> Result<Address, TxBuilderError> {
    Address::from_bech32(value).map_err(|_| TxBuilderError::MalformedAddress(value.to_string()))
}

/// Key hash of the payment credential, when it is a key and not a script
pub fn payment_key_hash(address: &Address) -> Option<Hash<28>> {
    match address {
        Address::Shelley(x) => match x.payment() {
            ShelleyPaymentPart::Key(hash) => Some(*hash),
            ShelleyPaymentPart::Script(_) => None,
        },
        _ => None,
    }
}

pub fn payment_script_hash(address: &Address) -> Option<Hash<28>> {
    match address {
        Address::Shelley(x) => match x.payment() {
            ShelleyPaymentPart::Script(hash) => Some(*hash),
            ShelleyPaymentPart::Key(_) => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantities_are_dropped() {
        let value = ValueBundle::lovelace(5).with("abcd", 0);
        assert_eq!(value, ValueBundle::lovelace(5));
        assert!(value.is_pure_coin());
    }

    #[test]
    fn subtraction_fails_on_underflow() {
        let a = ValueBundle::lovelace(10).with("ab", 1);
        let b = ValueBundle::lovelace(3).with("ab", 2);

        assert_eq!(a.checked_sub(&b), None);
        assert_eq!(
            a.checked_sub(&ValueBundle::lovelace(3)),
            Some(ValueBundle::lovelace(7).with("ab", 1))
        );
    }

    #[test]
    fn decimal_prices_are_exact() {
        assert_eq!(Rational::from_decimal("0.0577"), Rational::new(577, 10_000));
        assert_eq!(
            Rational::from_decimal("0.0000721"),
            Rational::new(721, 10_000_000)
        );
        assert_eq!(Rational::from_decimal("2"), Rational::new(2, 1));
        assert_eq!(Rational::from_decimal("1.50"), Rational::new(15, 10));
        assert_eq!(Rational::from_decimal("7.21e-5"), Rational::new(721, 10_000_000));
        assert_eq!(Rational::from_decimal("5E2"), Rational::new(500, 1));
        assert_eq!(Rational::from_decimal("-1"), None);
        assert_eq!(Rational::from_decimal("."), None);
        assert_eq!(Rational::from_decimal("1e-2147483648"), None);
        assert_eq!(Rational::from_decimal("1.5e-2147483647"), None);
    }

    #[test]
    fn balance_check_covers_every_unit() {
        let input = UnspentOutput::new(
            Hash::new([1; 32]),
            0,
            "addr",
            ValueBundle::lovelace(10).with("ab", 1),
        );

        let draft = TransactionDraft {
            inputs: vec![input],
            outputs: vec![],
            fee: 10,
            ttl: 1,
            script: None,
        };

        assert!(!draft.is_balanced());
    }
}
