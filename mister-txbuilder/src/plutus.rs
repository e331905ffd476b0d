use pallas_codec::utils::MaybeIndefArray;
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::{
    conway::{BigInt, BoundedBytes, Constr, PlutusData},
    Fragment,
};

use crate::TxBuilderError;

/// Compact tag of the first alternative of a constructor
const CONSTR_0: u64 = 121;

#[derive(Default, Debug, Clone, PartialEq)]
struct ConstrBuilder {
    tag: u64,
    fields: Vec<PlutusData>,
}

impl ConstrBuilder {
    fn field(mut self, item: PlutusData) -> Self {
        self.fields.push(item);
        self
    }

    fn build(self) -> PlutusData {
        PlutusData::Constr(Constr {
            tag: self.tag,
            any_constructor: None,
            fields: MaybeIndefArray::Indef(self.fields),
        })
    }
}

fn constr(tag: u64) -> ConstrBuilder {
    ConstrBuilder {
        tag,
        fields: vec![],
    }
}

/// Datum locking a vault output to the key hash of its owner.
pub fn vault_datum(owner: Hash<28>) -> PlutusData {
    constr(CONSTR_0)
        .field(PlutusData::BoundedBytes(BoundedBytes::from(owner.to_vec())))
        .build()
}

/// Owner key hash committed to by a vault datum, if the datum has the
/// expected shape.
pub fn vault_datum_owner(datum: &PlutusData) -> Option<Hash<28>> {
    let PlutusData::Constr(x) = datum else {
        return None;
    };

    if x.tag != CONSTR_0 || x.fields.len() != 1 {
        return None;
    }

    match x.fields.first() {
        Some(PlutusData::BoundedBytes(bytes)) => {
            let bytes: [u8; 28] = bytes.as_slice().try_into().ok()?;
            Some(Hash::new(bytes))
        }
        _ => None,
    }
}

/// Redeemer asking the vault to release `amount` lovelace.
pub fn withdraw_redeemer(amount: u64) -> Result<PlutusData, TxBuilderError> {
    let amount = i64::try_from(amount).map_err(|_| TxBuilderError::ValueOverflow)?;

    Ok(constr(CONSTR_0)
        .field(PlutusData::BigInt(BigInt::Int(amount.into())))
        .build())
}

pub(crate) fn datum_hash(datum: &PlutusData) -> Result<Hash<32>, TxBuilderError> {
    let bytes = datum
        .encode_fragment()
        .map_err(|_| TxBuilderError::UnencodableTransaction)?;

    Ok(Hasher::<256>::hash(&bytes))
}

pub(crate) fn decode_datum(bytes: &[u8]) -> Result<PlutusData, TxBuilderError> {
    PlutusData::decode_fragment(bytes).map_err(|e| TxBuilderError::MalformedDatum(e.to_string()))
}
