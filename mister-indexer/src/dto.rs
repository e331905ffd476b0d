use std::collections::BTreeMap;

use mister_txbuilder::{
    OutputDatum, PlutusVersion, ProtocolParameters, Rational, UnspentOutput, ValueBundle,
};
use pallas_crypto::hash::Hash;
use serde::Deserialize;

use crate::Error;

fn required<T>(value: Option<T>, field: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::Decode(format!("missing {field}")))
}

fn quantity(value: &str, field: &str) -> Result<u64, Error> {
    value
        .parse()
        .map_err(|_| Error::Decode(format!("{field} is not a quantity: {value}")))
}

fn price(value: Option<serde_json::Number>, field: &str) -> Result<Rational, Error> {
    let value = required(value, field)?.to_string();

    Rational::from_decimal(&value)
        .ok_or_else(|| Error::Decode(format!("{field} is not a price: {value}")))
}

#[derive(Debug, Deserialize)]
pub struct EpochParameters {
    pub min_fee_a: Option<u64>,
    pub min_fee_b: Option<u64>,
    pub max_tx_size: Option<u64>,
    pub max_val_size: Option<String>,
    pub key_deposit: Option<String>,
    pub pool_deposit: Option<String>,
    pub coins_per_utxo_size: Option<String>,
    pub price_mem: Option<serde_json::Number>,
    pub price_step: Option<serde_json::Number>,
    pub collateral_percent: Option<u64>,
    pub max_collateral_inputs: Option<u64>,
    #[serde(default)]
    pub cost_models_raw: Option<BTreeMap<String, Vec<i64>>>,
}

impl TryFrom<EpochParameters> for ProtocolParameters {
    type Error = Error;

    fn try_from(value: EpochParameters) -> Result<Self, Self::Error> {
        let cost_models = value
            .cost_models_raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(language, costs)| {
                let version = match language.as_str() {
                    "PlutusV1" => PlutusVersion::V1,
                    "PlutusV2" => PlutusVersion::V2,
                    "PlutusV3" => PlutusVersion::V3,
                    _ => return None,
                };

                Some((version, costs))
            })
            .collect();

        Ok(ProtocolParameters {
            min_fee_a: required(value.min_fee_a, "min_fee_a")?,
            min_fee_b: required(value.min_fee_b, "min_fee_b")?,
            coins_per_utxo_byte: quantity(
                &required(value.coins_per_utxo_size, "coins_per_utxo_size")?,
                "coins_per_utxo_size",
            )?,
            max_value_size: quantity(&required(value.max_val_size, "max_val_size")?, "max_val_size")?,
            max_tx_size: required(value.max_tx_size, "max_tx_size")?,
            pool_deposit: quantity(&required(value.pool_deposit, "pool_deposit")?, "pool_deposit")?,
            key_deposit: quantity(&required(value.key_deposit, "key_deposit")?, "key_deposit")?,
            price_mem: price(value.price_mem, "price_mem")?,
            price_step: price(value.price_step, "price_step")?,
            collateral_percent: required(value.collateral_percent, "collateral_percent")?,
            max_collateral_inputs: required(value.max_collateral_inputs, "max_collateral_inputs")?,
            cost_models,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LatestBlock {
    pub slot: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Amount {
    pub unit: String,
    pub quantity: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressUtxo {
    pub address: String,
    pub tx_hash: String,
    pub output_index: u64,
    pub amount: Vec<Amount>,
    pub data_hash: Option<String>,
    pub inline_datum: Option<String>,
}

impl TryFrom<AddressUtxo> for UnspentOutput {
    type Error = Error;

    fn try_from(value: AddressUtxo) -> Result<Self, Self::Error> {
        let tx_hash: Hash<32> = value
            .tx_hash
            .parse()
            .map_err(|_| Error::Decode(format!("bad tx hash {}", value.tx_hash)))?;

        let mut bundle = ValueBundle::new();

        for amount in value.amount.iter() {
            let q = quantity(&amount.quantity, &amount.unit)?;
            let total = bundle
                .quantity(&amount.unit)
                .checked_add(q)
                .ok_or_else(|| Error::Decode(format!("{} overflows", amount.unit)))?;

            bundle = bundle.with(amount.unit.clone(), total);
        }

        let datum = match (value.inline_datum, value.data_hash) {
            (Some(inline), _) => Some(OutputDatum::Inline(
                hex::decode(&inline).map_err(|_| Error::Decode(format!("bad inline datum {inline}")))?,
            )),
            (None, Some(hash)) => Some(OutputDatum::Hash(
                hash.parse()
                    .map_err(|_| Error::Decode(format!("bad datum hash {hash}")))?,
            )),
            (None, None) => None,
        };

        Ok(UnspentOutput {
            tx_hash,
            output_index: value.output_index,
            address: value.address,
            value: bundle,
            datum,
        })
    }
}

/// Error payload returned by the indexer on non-success statuses
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Best human-readable diagnostic carried by a raw error body
    pub fn diagnostic(raw: &str) -> String {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(ErrorBody {
                message: Some(serde_json::Value::String(message)),
                ..
            }) => message,
            Ok(ErrorBody {
                message: Some(other),
                ..
            }) => other.to_string(),
            Ok(ErrorBody {
                error: Some(error), ..
            }) => error,
            _ => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utxo_amounts_become_a_bundle() {
        let raw = serde_json::json!({
            "address": "addr_test1xyz",
            "tx_hash": "39a7a284c2a0948189dc45dec670211cd4d72f7b66c5726c08d9b3df11e44d58",
            "output_index": 1,
            "amount": [
                { "unit": "lovelace", "quantity": "42000000" },
                { "unit": "b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a76e7574636f696e", "quantity": "12" }
            ],
            "block": "7eb8e27d18686c7db9a18f8bbcfe34e3fed6e047afaa2d969904d15e934847e6",
            "data_hash": "9e1199a988ba72ffd6e9c269cadb3b53b5f360ff99f112d9b2ee30c4d74ad88b",
            "inline_datum": null,
            "reference_script_hash": null
        });

        let dto: AddressUtxo = serde_json::from_value(raw).unwrap();
        let utxo = UnspentOutput::try_from(dto).unwrap();

        assert_eq!(utxo.coin(), 42_000_000);
        assert!(!utxo.value.is_pure_coin());
        assert!(matches!(utxo.datum, Some(OutputDatum::Hash(_))));
    }

    #[test]
    fn missing_fee_coefficient_fails() {
        let raw = serde_json::json!({
            "min_fee_a": null,
            "min_fee_b": 155381,
        });

        let dto: EpochParameters = serde_json::from_value(raw).unwrap();

        assert_eq!(
            ProtocolParameters::try_from(dto),
            Err(Error::Decode("missing min_fee_a".into()))
        );
    }

    #[test]
    fn diagnostics_prefer_the_message() {
        let raw = r#"{"status_code":400,"error":"Bad Request","message":"\"transaction submit error ShelleyTxValidationError\""}"#;
        assert_eq!(
            ErrorBody::diagnostic(raw),
            "\"transaction submit error ShelleyTxValidationError\""
        );

        assert_eq!(ErrorBody::diagnostic("plain text"), "plain text");
    }
}
