use mister_indexer::Indexer;
use mister_txbuilder::{
    build_deposit, build_transfer, build_withdrawal, check_ttl, combine, DatumMode,
    ExecutionUnits, PaymentRequest, PlutusScript, ProtocolParameters, SignedTransaction,
    UnsignedTransaction, UnspentOutput, VaultDeposit, VaultWithdrawal,
};
use pallas_crypto::hash::Hash;
use tracing::{debug, info, instrument};

use crate::Error;

/// The locking script and how spends against it are priced
#[derive(Debug, Clone, PartialEq)]
pub struct VaultOptions {
    pub script: PlutusScript,
    pub address: String,
    pub datum_mode: DatumMode,
    pub ex_units: ExecutionUnits,
    pub min_collateral: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub ttl_offset: u64,
    pub fee_buffer: u64,
    pub vault: Option<VaultOptions>,
}

/// What the caller wants the transaction to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildRequest {
    /// Pays `amount` from `from` to `to`
    Transfer {
        from: String,
        to: String,
        amount: u64,
    },

    /// Locks `amount` from `from` at the vault, for `owner` to withdraw
    Deposit {
        from: String,
        owner: Hash<28>,
        amount: u64,
    },

    /// Releases `amount` from the vault to `to`, change back to `owner_address`
    Withdraw {
        owner_address: String,
        owner: Hash<28>,
        to: String,
        amount: u64,
    },
}

/// Fetches chain state, builds, combines witnesses and submits.
///
/// Holds no chain state of its own, every build reads parameters, tip and
/// UTxOs anew.
pub struct Pipeline<I> {
    indexer: I,
    options: PipelineOptions,
}

impl<I: Indexer> Pipeline<I> {
    pub fn new(indexer: I, options: PipelineOptions) -> Self {
        Self { indexer, options }
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    pub async fn protocol_parameters(&self) -> Result<ProtocolParameters, Error> {
        self.indexer
            .protocol_parameters()
            .await
            .map_err(Error::fetch)
    }

    pub async fn utxos(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        self.indexer.utxos(address).await.map_err(Error::fetch)
    }

    fn vault(&self) -> Result<&VaultOptions, Error> {
        self.options
            .vault
            .as_ref()
            .ok_or_else(|| Error::InvalidRequest("no vault script configured".into()))
    }

    /// Builds the unsigned transaction for `request` against the current tip
    #[instrument(skip_all)]
    pub async fn build(&self, request: &BuildRequest) -> Result<UnsignedTransaction, Error> {
        let (params, tip) = tokio::try_join!(
            self.indexer.protocol_parameters(),
            self.indexer.tip_slot()
        )
        .map_err(Error::fetch)?;

        let ttl = tip.saturating_add(self.options.ttl_offset);
        check_ttl(ttl, tip)?;

        debug!(tip, ttl, "resolved validity interval");

        let unsigned = match request {
            BuildRequest::Transfer { from, to, amount } => {
                let utxos = self.utxos(from).await?;

                let payment = PaymentRequest {
                    from: from.clone(),
                    to: to.clone(),
                    amount: *amount,
                    datum: None,
                    ttl,
                    fee_buffer: self.options.fee_buffer,
                };

                build_transfer(&payment, &utxos, &params)?
            }
            BuildRequest::Deposit {
                from,
                owner,
                amount,
            } => {
                let vault = self.vault()?;
                let utxos = self.utxos(from).await?;

                let deposit = VaultDeposit {
                    from: from.clone(),
                    script: vault.script.clone(),
                    script_address: vault.address.clone(),
                    owner: *owner,
                    amount: *amount,
                    ttl,
                    fee_buffer: self.options.fee_buffer,
                    datum_mode: vault.datum_mode,
                };

                build_deposit(&deposit, &utxos, &params)?
            }
            BuildRequest::Withdraw {
                owner_address,
                owner,
                to,
                amount,
            } => {
                let vault = self.vault()?;

                let (script_utxos, owner_utxos) = tokio::try_join!(
                    self.indexer.utxos(&vault.address),
                    self.indexer.utxos(owner_address)
                )
                .map_err(Error::fetch)?;

                let withdrawal = VaultWithdrawal {
                    script: vault.script.clone(),
                    script_address: vault.address.clone(),
                    owner: *owner,
                    owner_address: owner_address.clone(),
                    recipient: to.clone(),
                    amount: *amount,
                    ttl,
                    ex_units: vault.ex_units,
                    min_collateral: vault.min_collateral,
                };

                build_withdrawal(&withdrawal, &script_utxos, &owner_utxos, &params)?
            }
        };

        info!(tx_hash = %unsigned.tx_hash, size = unsigned.bytes.len(), "built transaction");

        Ok(unsigned)
    }

    /// Merges the caller's witness set into the unsigned transaction
    pub fn sign(&self, unsigned: &[u8], witness: &[u8]) -> Result<SignedTransaction, Error> {
        let signed = combine(unsigned, witness)?;

        debug!(tx_hash = %signed.tx_hash, "witnesses combined");

        Ok(signed)
    }

    /// Hands a signed transaction to the node and returns its id
    pub async fn submit(&self, tx: &[u8]) -> Result<Hash<32>, Error> {
        let id = self.indexer.submit(tx).await.map_err(Error::submission)?;

        info!(%id, "transaction submitted");

        Ok(id)
    }
}
