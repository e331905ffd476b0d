use pallas_codec::minicbor;
use pallas_crypto::{
    hash::{Hash, Hasher},
    key::ed25519::{PublicKey, Signature},
};
use pallas_primitives::{
    conway::{BootstrapWitness, MintedTx, MintedWitnessSet, VKeyWitness},
    NonEmptySet,
};

use crate::{SignedTransaction, TxBuilderError};

fn verify(tx_hash: &Hash<32>, vkey: &[u8], signature: &[u8]) -> Result<(), TxBuilderError> {
    let malformed = || TxBuilderError::MalformedWitnessSet(format!("bad key or signature for {}", hex::encode(vkey)));

    let public_key = PublicKey::try_from(vkey).map_err(|_| malformed())?;
    let signature = Signature::try_from(signature).map_err(|_| malformed())?;

    if !public_key.verify(tx_hash, &signature) {
        return Err(TxBuilderError::InvalidSignature(hex::encode(vkey)));
    }

    Ok(())
}

fn merge<T: Clone, K: PartialEq>(
    existing: Option<&NonEmptySet<T>>,
    incoming: Option<&NonEmptySet<T>>,
    key: impl Fn(&T) -> K,
) -> Option<NonEmptySet<T>> {
    let mut out: Vec<T> = existing.map(|x| x.iter().cloned().collect()).unwrap_or_default();

    for item in incoming.iter().flat_map(|x| x.iter()) {
        if !out.iter().any(|x| key(x) == key(item)) {
            out.push(item.clone());
        }
    }

    NonEmptySet::from_vec(out)
}

/// Adds the signatures of a wallet-provided witness set to an unsigned
/// transaction.
///
/// Only verification-key and bootstrap witnesses are taken from the client,
/// after checking them against the transaction id. Every other part of the
/// transaction keeps its original encoding.
pub fn combine(unsigned: &[u8], client_witness: &[u8]) -> Result<SignedTransaction, TxBuilderError> {
    let tx: MintedTx = minicbor::decode(unsigned)
        .map_err(|e| TxBuilderError::CorruptedTxBytes(e.to_string()))?;

    let client: MintedWitnessSet = minicbor::decode(client_witness)
        .map_err(|e| TxBuilderError::MalformedWitnessSet(e.to_string()))?;

    let tx_hash = Hasher::<256>::hash(tx.transaction_body.raw_cbor());

    let client_vkeys = client.vkeywitness.as_ref();
    let client_bootstrap = client.bootstrap_witness.as_ref();

    if client_vkeys.is_none() && client_bootstrap.is_none() {
        return Err(TxBuilderError::MalformedWitnessSet(
            "witness set carries no signature".into(),
        ));
    }

    for w in client_vkeys.iter().flat_map(|x| x.iter()) {
        verify(&tx_hash, &w.vkey, &w.signature)?;
    }

    for w in client_bootstrap.iter().flat_map(|x| x.iter()) {
        verify(&tx_hash, &w.public_key, &w.signature)?;
    }

    let MintedTx {
        transaction_body,
        transaction_witness_set,
        success,
        auxiliary_data,
    } = tx;

    let mut witness_set = transaction_witness_set.unwrap();

    witness_set.vkeywitness = merge(
        witness_set.vkeywitness.as_ref(),
        client_vkeys,
        |x: &VKeyWitness| x.vkey.to_vec(),
    );

    witness_set.bootstrap_witness = merge(
        witness_set.bootstrap_witness.as_ref(),
        client_bootstrap,
        |x: &BootstrapWitness| x.public_key.to_vec(),
    );

    let signed_by: Vec<Hash<28>> = witness_set
        .vkeywitness
        .iter()
        .flat_map(|x| x.iter())
        .map(|x| Hasher::<224>::hash(&x.vkey))
        .collect();

    for signer in transaction_body.required_signers.iter().flat_map(|x| x.iter()) {
        if !signed_by.contains(signer) {
            return Err(TxBuilderError::MissingRequiredSigner(signer.to_string()));
        }
    }

    let mut bytes = Vec::new();

    minicbor::Encoder::new(&mut bytes)
        .array(4)
        .and_then(|e| e.encode(&transaction_body))
        .and_then(|e| e.encode(&witness_set))
        .and_then(|e| e.bool(success))
        .and_then(|e| e.encode(&auxiliary_data))
        .map_err(|_| TxBuilderError::UnencodableTransaction)?;

    tracing::info!(%tx_hash, signatures = signed_by.len(), "combined witnesses");

    Ok(SignedTransaction { tx_hash, bytes })
}
