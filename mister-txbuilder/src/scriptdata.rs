use pallas_codec::minicbor::{self, data::Type, Decoder, Encode};
use pallas_crypto::hash::{Hash, Hasher};

use crate::{PlutusVersion, TxBuilderError};

/// Witness set map keys committed to by the script data hash
const DATUMS_KEY: u64 = 4;
const REDEEMERS_KEY: u64 = 5;

/// Cost model of a single language, as committed to by the script data hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageView<'a>(pub PlutusVersion, pub &'a [i64]);

impl<C> Encode<C> for LanguageView<'_> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self.0 {
            // plutus v1 keeps the historical double bytes wrapping with an
            // indefinite list inside
            PlutusVersion::V1 => {
                let mut inner = vec![];
                let mut sub = minicbor::Encoder::new(&mut inner);

                sub.begin_array()
                    .and_then(|s| {
                        for v in self.1.iter() {
                            s.encode_with(v, ctx)?;
                        }
                        s.end()
                    })
                    .map_err(|_| minicbor::encode::Error::message("cost model"))?;

                e.map(1)?;
                e.bytes(&[0x00])?;
                e.bytes(&inner)?;
                Ok(())
            }
            other => {
                e.map(1)?;
                e.u8(other.language_id())?;
                e.encode_with(self.1, ctx)?;
                Ok(())
            }
        }
    }
}

/// Raw datums and redeemers entries of an encoded witness set.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RawScriptData<'b> {
    pub datums: Option<&'b [u8]>,
    pub redeemers: Option<&'b [u8]>,
}

/// Slices the datums and redeemers entries out of witness set bytes
/// without re-encoding them.
pub fn extract_raw(witness_set: &[u8]) -> Result<RawScriptData<'_>, TxBuilderError> {
    let malformed = |e: minicbor::decode::Error| TxBuilderError::MalformedWitnessSet(e.to_string());

    let mut d = Decoder::new(witness_set);
    let mut out = RawScriptData::default();

    let len = d.map().map_err(malformed)?;
    let mut seen = 0;

    loop {
        match len {
            Some(n) if seen == n => break,
            None if d.datatype().map_err(malformed)? == Type::Break => break,
            _ => (),
        }

        let key = d.u64().map_err(malformed)?;
        let start = d.position();
        d.skip().map_err(malformed)?;
        let end = d.position();

        match key {
            DATUMS_KEY => out.datums = Some(&witness_set[start..end]),
            REDEEMERS_KEY => out.redeemers = Some(&witness_set[start..end]),
            _ => (),
        }

        seen += 1;
    }

    Ok(out)
}

/// Hash committing the body to the redeemers, datums and cost model of a
/// witness set.
pub fn script_data_hash(
    witness_set: &[u8],
    version: PlutusVersion,
    cost_model: &[i64],
) -> Result<Hash<32>, TxBuilderError> {
    let raw = extract_raw(witness_set)?;

    let redeemers = raw.redeemers.ok_or(TxBuilderError::RedeemerTargetMissing)?;

    let mut buf = redeemers.to_vec();

    if let Some(datums) = raw.datums {
        buf.extend_from_slice(datums);
    }

    minicbor::encode(LanguageView(version, cost_model), &mut buf)
        .map_err(|_| TxBuilderError::UnencodableTransaction)?;

    Ok(Hasher::<256>::hash(&buf))
}

#[cfg(test)]
mod tests {
    use pallas_codec::utils::MaybeIndefArray;
    use pallas_primitives::{
        conway::{BigInt, Constr, ExUnits, PlutusData, Redeemer, RedeemerTag, Redeemers, WitnessSet},
        NonEmptySet,
    };
    use test_case::test_case;

    use super::*;

    const MAINNET_PLUTUS_V1: [i64; 166] = [
        100788, 420, 1, 1, 1000, 173, 0, 1, 1000, 59957, 4, 1, 11183, 32, 201305, 8356, 4, 16000,
        100, 16000, 100, 16000, 100, 16000, 100, 16000, 100, 16000, 100, 100, 100, 16000, 100,
        94375, 32, 132994, 32, 61462, 4, 72010, 178, 0, 1, 22151, 32, 91189, 769, 4, 2, 85848,
        228465, 122, 0, 1, 1, 1000, 42921, 4, 2, 24548, 29498, 38, 1, 898148, 27279, 1, 51775, 558,
        1, 39184, 1000, 60594, 1, 141895, 32, 83150, 32, 15299, 32, 76049, 1, 13169, 4, 22100, 10,
        28999, 74, 1, 28999, 74, 1, 43285, 552, 1, 44749, 541, 1, 33852, 32, 68246, 32, 72362, 32,
        7243, 32, 7391, 32, 11546, 32, 85848, 228465, 122, 0, 1, 1, 90434, 519, 0, 1, 74433, 32,
        85848, 228465, 122, 0, 1, 1, 85848, 228465, 122, 0, 1, 1, 270652, 22588, 4, 1457325, 64566,
        4, 20467, 1, 4, 0, 141992, 32, 100788, 420, 1, 1, 81663, 32, 59498, 32, 20142, 32, 24588,
        32, 20744, 32, 25933, 32, 24623, 32, 53384111, 14333, 10,
    ];

    const MAINNET_PLUTUS_V2: [i64; 175] = [
        100788, 420, 1, 1, 1000, 173, 0, 1, 1000, 59957, 4, 1, 11183, 32, 201305, 8356, 4, 16000,
        100, 16000, 100, 16000, 100, 16000, 100, 16000, 100, 16000, 100, 100, 100, 16000, 100,
        94375, 32, 132994, 32, 61462, 4, 72010, 178, 0, 1, 22151, 32, 91189, 769, 4, 2, 85848,
        228465, 122, 0, 1, 1, 1000, 42921, 4, 2, 24548, 29498, 38, 1, 898148, 27279, 1, 51775, 558,
        1, 39184, 1000, 60594, 1, 141895, 32, 83150, 32, 15299, 32, 76049, 1, 13169, 4, 22100, 10,
        28999, 74, 1, 28999, 74, 1, 43285, 552, 1, 44749, 541, 1, 33852, 32, 68246, 32, 72362, 32,
        7243, 32, 7391, 32, 11546, 32, 85848, 228465, 122, 0, 1, 1, 90434, 519, 0, 1, 74433, 32,
        85848, 228465, 122, 0, 1, 1, 85848, 228465, 122, 0, 1, 1, 955506, 213312, 0, 2, 270652,
        22588, 4, 1457325, 64566, 4, 20467, 1, 4, 0, 141992, 32, 100788, 420, 1, 1, 81663, 32,
        59498, 32, 20142, 32, 24588, 32, 20744, 32, 25933, 32, 24623, 32, 43053543, 10, 53384111,
        14333, 10, 43574283, 26308, 10,
    ];

    /// Witness set with a vault datum and a single spend redeemer
    const VAULT_WITNESS_SET: &str = "a20481d8799f581c3e51e83bbcbc603a305bc7078ff2d671adc69507c747e0c1fb2b9b8bff0581840000d87980821a00155cc01a1dcd6500";

    fn witness_set(datum: Option<PlutusData>) -> WitnessSet {
        let redeemers = Redeemers::List(MaybeIndefArray::Def(vec![Redeemer {
            tag: RedeemerTag::Spend,
            index: 0,
            data: PlutusData::BigInt(BigInt::Int(42i64.into())),
            ex_units: ExUnits {
                mem: 1_000,
                steps: 2_000,
            },
        }]));

        WitnessSet {
            vkeywitness: None,
            native_script: None,
            bootstrap_witness: None,
            plutus_v1_script: None,
            plutus_v2_script: None,
            plutus_v3_script: None,
            plutus_data: datum.and_then(|x| NonEmptySet::from_vec(vec![x])),
            redeemer: Some(redeemers),
        }
    }

    #[test]
    fn raw_entries_match_typed_encoding() {
        let datum = PlutusData::Constr(Constr {
            tag: 121,
            any_constructor: None,
            fields: MaybeIndefArray::Indef(vec![]),
        });

        let ws = witness_set(Some(datum));
        let bytes = minicbor::to_vec(&ws).unwrap();

        let raw = extract_raw(&bytes).unwrap();

        assert_eq!(
            raw.redeemers.unwrap(),
            minicbor::to_vec(ws.redeemer.as_ref().unwrap()).unwrap()
        );
        assert_eq!(
            raw.datums.unwrap(),
            minicbor::to_vec(ws.plutus_data.as_ref().unwrap()).unwrap()
        );
    }

    #[test]
    fn hash_covers_the_cost_model() {
        let bytes = minicbor::to_vec(witness_set(None)).unwrap();

        let a = script_data_hash(&bytes, PlutusVersion::V2, &[1, 2, 3]).unwrap();
        let b = script_data_hash(&bytes, PlutusVersion::V2, &[1, 2, 4]).unwrap();
        let c = script_data_hash(&bytes, PlutusVersion::V3, &[1, 2, 3]).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_requires_redeemers() {
        let mut ws = witness_set(None);
        ws.redeemer = None;
        let bytes = minicbor::to_vec(ws).unwrap();

        assert_eq!(
            script_data_hash(&bytes, PlutusVersion::V2, &[]),
            Err(TxBuilderError::RedeemerTargetMissing)
        );
    }

    #[test]
    fn v1_view_is_double_wrapped() {
        let bytes = minicbor::to_vec(LanguageView(PlutusVersion::V1, &[5])).unwrap();
        // map(1) { bytes(1) 0x00 : bytes(3) [_ 5] }
        assert_eq!(bytes, vec![0xa1, 0x41, 0x00, 0x43, 0x9f, 0x05, 0xff]);
    }

    #[test_case(PlutusVersion::V2, &MAINNET_PLUTUS_V2, "99832ee74ffd506f7c12e9104d6ddb16b373a1a2178fafe8dd0c0297b4a072bc" ; "v2")]
    #[test_case(PlutusVersion::V1, &MAINNET_PLUTUS_V1, "a2f1a1c8a054188f266050befe9be3bbeea305139343bc69b87916686d940cb4" ; "v1")]
    fn hash_of_known_witness_set(version: PlutusVersion, cost_model: &[i64], expected: &str) {
        let bytes = hex::decode(VAULT_WITNESS_SET).unwrap();

        let hash = script_data_hash(&bytes, version, cost_model).unwrap();

        assert_eq!(hash.to_string(), expected);
    }

    #[test]
    fn hash_without_datums_skips_them() {
        let bytes = hex::decode("a10581840000d87980821a00155cc01a1dcd6500").unwrap();

        let hash = script_data_hash(&bytes, PlutusVersion::V2, &MAINNET_PLUTUS_V2).unwrap();

        assert_eq!(
            hash.to_string(),
            "39cb49ad96d967a2e69c1b40aa96cabb3701fbc385df930c0c93b192860ee779"
        );
    }
}
