use std::collections::BTreeMap;

use pallas_addresses::{
    Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart,
};
use pallas_crypto::{hash::Hash, key::ed25519::SecretKey};

use crate::{PlutusScript, PlutusVersion, ProtocolParameters, Rational, UnspentOutput, ValueBundle};

pub fn params() -> ProtocolParameters {
    ProtocolParameters {
        min_fee_a: 44,
        min_fee_b: 155_381,
        coins_per_utxo_byte: 4_310,
        max_value_size: 5_000,
        max_tx_size: 16_384,
        pool_deposit: 500_000_000,
        key_deposit: 2_000_000,
        price_mem: Rational::new(577, 10_000).unwrap(),
        price_step: Rational::new(721, 10_000_000).unwrap(),
        collateral_percent: 150,
        max_collateral_inputs: 3,
        cost_models: BTreeMap::from([
            (PlutusVersion::V2, vec![100_788, 420, 1, 1, 1_000, 173]),
            (PlutusVersion::V3, vec![100_788, 420, 1, 1, 1_000, 173, 0, 1]),
        ]),
    }
}

pub fn signing_key(seed: u8) -> SecretKey {
    SecretKey::from([seed; 32])
}

pub fn key_hash(seed: u8) -> Hash<28> {
    pallas_crypto::hash::Hasher::<224>::hash(signing_key(seed).public_key().as_ref())
}

/// Testnet enterprise address paying to the key derived from `seed`
pub fn key_address(seed: u8) -> (Address, String) {
    let address: Address = ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::key_hash(key_hash(seed)),
        ShelleyDelegationPart::Null,
    )
    .into();

    let bech32 = address.to_bech32().unwrap();

    (address, bech32)
}

pub fn vault_script() -> PlutusScript {
    PlutusScript::new(PlutusVersion::V2, vec![0x45, 0x01, 0x00, 0x00, 0x22, 0x22])
}

pub fn script_address(script: &PlutusScript) -> (Address, String) {
    let address: Address = ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::script_hash(script.hash()),
        ShelleyDelegationPart::Null,
    )
    .into();

    let bech32 = address.to_bech32().unwrap();

    (address, bech32)
}

pub fn utxo(seed: u8, index: u64, address: &str, value: ValueBundle) -> UnspentOutput {
    UnspentOutput::new(Hash::new([seed; 32]), index, address, value)
}
