pub use crate::{
    build_deposit, build_transfer, build_unsigned, build_withdrawal, combine, plan_deposit,
    plan_payment, plan_withdrawal, DatumMode, ExecutionUnits, OutputDatum, PaymentRequest,
    PlutusScript, PlutusVersion, ProtocolParameters, Rational, SignedTransaction,
    TransactionDraft, TxBuilderError, UnsignedTransaction, UnspentOutput, ValueBundle,
    VaultDeposit, VaultWithdrawal,
};
pub use pallas_codec::minicbor::{Decode, Encode};
pub use pallas_primitives::Fragment;
