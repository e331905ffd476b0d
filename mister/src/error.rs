use mister_txbuilder::TxBuilderError;
use thiserror::Error;

/// Failure of a pipeline stage, as surfaced to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Parameters, tip or UTxOs could not be fetched, the build stops here
    #[error("indexer unavailable: {0}")]
    IndexerUnavailable(String),

    #[error("insufficient funds: {required} lovelace required, best candidate holds {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("no utxo available at the source address")]
    NoUtxoAtSource,

    #[error("address decode error: {0}")]
    AddressDecode(String),

    #[error("malformed witness set: {0}")]
    MalformedWitnessSet(String),

    #[error("serialized transaction size {size} exceeds the maximum of {max}")]
    SerializedSizeExceedsMax { size: u64, max: u64 },

    /// The node refused the transaction, with its diagnostic unchanged
    #[error("rejected by node: {0}")]
    RejectedByNode(String),

    /// The submission endpoint gave no answer, only safe to retry with a
    /// freshly rebuilt transaction
    #[error("submission timed out")]
    SubmissionTimeout,

    #[error("script spend has no usable collateral input")]
    MissingCollateral,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Build(TxBuilderError),
}

impl Error {
    /// The caller may try again, after rebuilding the transaction
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SubmissionTimeout | Error::IndexerUnavailable(_))
    }

    /// The request itself is wrong, retrying it unchanged can't succeed
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFunds { .. }
                | Error::NoUtxoAtSource
                | Error::AddressDecode(_)
                | Error::MalformedWitnessSet(_)
                | Error::MissingCollateral
                | Error::InvalidRequest(_)
                | Error::Build(
                    TxBuilderError::OutputBelowMinimum { .. }
                        | TxBuilderError::MissingDatum
                        | TxBuilderError::DatumMismatch
                        | TxBuilderError::MalformedAssetUnit(_)
                )
        )
    }

    /// Classifies a failed chain query
    pub fn fetch(error: mister_indexer::Error) -> Self {
        Error::IndexerUnavailable(error.to_string())
    }

    /// Classifies a failed submission
    pub fn submission(error: mister_indexer::Error) -> Self {
        match error {
            mister_indexer::Error::Timeout | mister_indexer::Error::Transport(_) => {
                Error::SubmissionTimeout
            }
            mister_indexer::Error::Rejected(message) => Error::RejectedByNode(message),
            other => Error::IndexerUnavailable(other.to_string()),
        }
    }
}

impl From<TxBuilderError> for Error {
    fn from(value: TxBuilderError) -> Self {
        match value {
            TxBuilderError::InsufficientFunds {
                required,
                available,
            } => Error::InsufficientFunds {
                required,
                available,
            },
            TxBuilderError::NoUtxoAtSource => Error::NoUtxoAtSource,
            TxBuilderError::MalformedAddress(_) | TxBuilderError::ScriptAddressMismatch(_) => {
                Error::AddressDecode(value.to_string())
            }
            TxBuilderError::MalformedWitnessSet(_)
            | TxBuilderError::InvalidSignature(_)
            | TxBuilderError::MissingRequiredSigner(_) => {
                Error::MalformedWitnessSet(value.to_string())
            }
            TxBuilderError::CorruptedTxBytes(_) => Error::InvalidRequest(value.to_string()),
            TxBuilderError::SerializedSizeExceedsMax { size, max } => {
                Error::SerializedSizeExceedsMax { size, max }
            }
            TxBuilderError::MissingCollateral => Error::MissingCollateral,
            other => Error::Build(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(mister_indexer::Error::Timeout, Error::SubmissionTimeout ; "timeout")]
    #[test_case(
        mister_indexer::Error::Transport("connection refused".into()),
        Error::SubmissionTimeout
        ; "refused connection"
    )]
    #[test_case(
        mister_indexer::Error::Rejected("bad request".into()),
        Error::RejectedByNode("bad request".into())
        ; "rejection"
    )]
    #[test_case(
        mister_indexer::Error::Unavailable("502".into()),
        Error::IndexerUnavailable("indexer unavailable: 502".into())
        ; "gateway"
    )]
    fn submission_classification(error: mister_indexer::Error, expected: Error) {
        assert_eq!(Error::submission(error), expected);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(Error::SubmissionTimeout.is_retryable());
        assert!(Error::IndexerUnavailable("down".into()).is_retryable());
        assert!(!Error::RejectedByNode("FeeTooSmallUTxO".into()).is_retryable());
        assert!(!Error::MalformedWitnessSet("garbage".into()).is_retryable());
    }

    #[test]
    fn builder_failures_keep_their_class() {
        let err = Error::from(TxBuilderError::MalformedAddress("addr1??".into()));
        assert!(matches!(err, Error::AddressDecode(_)));
        assert!(err.is_caller_error());

        let err = Error::from(TxBuilderError::MissingCollateral);
        assert_eq!(err, Error::MissingCollateral);
        assert!(err.is_caller_error());

        let err = Error::from(TxBuilderError::SerializedSizeExceedsMax { size: 20_000, max: 16_384 });
        assert!(!err.is_caller_error());
        assert!(!err.is_retryable());
    }
}
