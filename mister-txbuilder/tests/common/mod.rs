#![allow(dead_code)]

use std::collections::BTreeMap;

use mister_txbuilder::prelude::*;
use pallas_addresses::{Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_crypto::{
    hash::{Hash, Hasher},
    key::ed25519::SecretKey,
};
use pallas_primitives::{
    conway::{VKeyWitness, WitnessSet},
    NonEmptySet,
};

pub fn params() -> ProtocolParameters {
    ProtocolParameters {
        min_fee_a: 44,
        min_fee_b: 155_381,
        coins_per_utxo_byte: 4_310,
        max_value_size: 5_000,
        max_tx_size: 16_384,
        pool_deposit: 500_000_000,
        key_deposit: 2_000_000,
        price_mem: Rational::from_decimal("0.0577").unwrap(),
        price_step: Rational::from_decimal("0.0000721").unwrap(),
        collateral_percent: 150,
        max_collateral_inputs: 3,
        cost_models: BTreeMap::from([(PlutusVersion::V2, vec![205_665, 812, 1, 1, 1_000, 571])]),
    }
}

pub fn signing_key(seed: u8) -> SecretKey {
    SecretKey::from([seed; 32])
}

pub fn key_hash(seed: u8) -> Hash<28> {
    Hasher::<224>::hash(signing_key(seed).public_key().as_ref())
}

fn bech32(payment: ShelleyPaymentPart) -> String {
    let address: Address =
        ShelleyAddress::new(Network::Testnet, payment, ShelleyDelegationPart::Null).into();

    address.to_bech32().unwrap()
}

pub fn key_address(seed: u8) -> String {
    bech32(ShelleyPaymentPart::key_hash(key_hash(seed)))
}

pub fn vault_script() -> PlutusScript {
    PlutusScript::new(
        PlutusVersion::V2,
        hex::decode("581c01000033223232222350040071235002353003001498498480048005").unwrap(),
    )
}

pub fn script_address(script: &PlutusScript) -> String {
    bech32(ShelleyPaymentPart::script_hash(script.hash()))
}

pub fn utxo(seed: u8, index: u64, address: &str, coin: u64) -> UnspentOutput {
    UnspentOutput::new(Hash::new([seed; 32]), index, address, ValueBundle::lovelace(coin))
}

/// Encoded witness set holding a single signature of `tx_hash`
pub fn sign(seed: u8, tx_hash: &Hash<32>) -> Vec<u8> {
    let key = signing_key(seed);

    let ws = WitnessSet {
        vkeywitness: NonEmptySet::from_vec(vec![VKeyWitness {
            vkey: key.public_key().as_ref().to_vec().into(),
            signature: key.sign(tx_hash).as_ref().to_vec().into(),
        }]),
        native_script: None,
        bootstrap_witness: None,
        plutus_v1_script: None,
        plutus_v2_script: None,
        plutus_v3_script: None,
        plutus_data: None,
        redeemer: None,
    };

    pallas_codec::minicbor::to_vec(ws).unwrap()
}
