use mister_txbuilder::{prelude::*, min_utxo_value, select_inputs, AssetFilter};
use proptest::prelude::*;

mod common;

use common::*;

fn candidates(coins: &[u64]) -> Vec<UnspentOutput> {
    let from = key_address(1);

    coins
        .iter()
        .enumerate()
        .map(|(i, coin)| utxo(i as u8, i as u64, &from, *coin))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn selection_is_deterministic_first_fit(
        coins in prop::collection::vec(1u64..50_000_000, 1..20),
        required in 1u64..60_000_000,
    ) {
        let candidates = candidates(&coins);

        let a = select_inputs(&candidates, required, AssetFilter::CoinOnly);
        let b = select_inputs(&candidates, required, AssetFilter::CoinOnly);
        prop_assert_eq!(&a, &b);

        match a {
            Ok(selected) => {
                prop_assert_eq!(selected.len(), 1);
                let first = candidates.iter().position(|x| x.coin() >= required).unwrap();
                prop_assert_eq!(&selected[0], &candidates[first]);
            }
            Err(TxBuilderError::InsufficientFunds { available, .. }) => {
                prop_assert!(coins.iter().all(|x| *x < required));
                prop_assert_eq!(available, *coins.iter().max().unwrap());
            }
            Err(other) => prop_assert!(false, "unexpected {other:?}"),
        }
    }

    #[test]
    fn transfers_conserve_value(
        coin in 2_000_000u64..1_000_000_000_000,
        amount in 1_000_000u64..500_000_000_000,
    ) {
        let params = params();

        let request = PaymentRequest {
            from: key_address(1),
            to: key_address(2),
            amount,
            datum: None,
            ttl: 10_000,
            fee_buffer: 300_000,
        };

        if let Ok(draft) = plan_payment(&request, &candidates(&[coin]), &params) {
            prop_assert!(draft.is_balanced());

            for output in draft.outputs.iter() {
                prop_assert!(output.value.coin() >= min_utxo_value(output, &params).unwrap());
            }

            prop_assert!(build_unsigned(&draft, &params).is_ok());
        } else {
            prop_assert!(coin < amount + 300_000);
        }
    }

    #[test]
    fn merging_a_witness_twice_is_idempotent(seed in 1u8..=255, amount in 1_000_000u64..5_000_000) {
        let params = params();

        let request = PaymentRequest {
            from: key_address(1),
            to: key_address(2),
            amount,
            datum: None,
            ttl: 10_000,
            fee_buffer: 500_000,
        };

        let unsigned = build_transfer(&request, &candidates(&[10_000_000]), &params).unwrap();
        let witness = sign(seed, &unsigned.tx_hash);

        let once = combine(&unsigned.bytes, &witness).unwrap();
        let twice = combine(&once.bytes, &witness).unwrap();

        prop_assert_eq!(once, twice);
    }
}
