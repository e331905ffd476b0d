use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use mister::{BuildRequest, Pipeline, Settings};
use mister_indexer::BlockfrostClient;
use pallas_crypto::hash::Hash;
use tracing_subscriber::{
    filter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
    Layer as _, Registry,
};

#[derive(Parser)]
#[command(name = "mister", version, about = "Vault transactions over Blockfrost")]
struct Args {
    /// Path to configuration, defaults to ./mister.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the current protocol parameters
    Params,

    /// Lists the unspent outputs at an address
    Utxos {
        #[arg(long)]
        address: String,
    },

    /// Builds an unsigned transaction and prints its hex
    Build {
        #[arg(long)]
        from: String,

        /// Recipient, not needed for deposits
        #[arg(long, required_unless_present = "deposit_owner")]
        to: Option<String>,

        /// Lovelace to move
        #[arg(long)]
        amount: u64,

        /// Locks the amount in the vault for this payment key hash
        #[arg(long, conflicts_with = "withdraw_owner")]
        deposit_owner: Option<String>,

        /// Spends from the vault for this payment key hash, `from` receives change
        #[arg(long)]
        withdraw_owner: Option<String>,
    },

    /// Merges a witness set into an unsigned transaction
    Sign {
        /// Unsigned transaction hex
        #[arg(long)]
        tx: String,

        /// Witness set hex, as produced by the signer
        #[arg(long)]
        witness: String,
    },

    /// Submits a signed transaction
    Submit {
        /// Signed transaction hex
        #[arg(long)]
        tx: String,
    },
}

fn key_hash(raw: &str) -> Result<Hash<28>> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("{raw} is not a payment key hash"))
}

fn request(
    from: String,
    to: Option<String>,
    amount: u64,
    deposit_owner: Option<String>,
    withdraw_owner: Option<String>,
) -> Result<BuildRequest> {
    let request = match (deposit_owner, withdraw_owner) {
        (Some(owner), _) => BuildRequest::Deposit {
            from,
            owner: key_hash(&owner)?,
            amount,
        },
        (None, Some(owner)) => BuildRequest::Withdraw {
            owner_address: from,
            owner: key_hash(&owner)?,
            to: to.context("--to is required")?,
            amount,
        },
        (None, None) => BuildRequest::Transfer {
            from,
            to: to.context("--to is required")?,
            amount,
        },
    };

    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG selects levels, events only, INFO by default
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env().add_directive(filter::LevelFilter::INFO.into()))
        .with_filter(filter::filter_fn(|meta| meta.is_event()));
    Registry::default().with(fmt_layer).init();

    let settings = Settings::load(args.config.as_deref())?;

    let indexer = BlockfrostClient::new(settings.indexer()?)?;
    let pipeline = Pipeline::new(indexer, settings.pipeline()?);

    match args.command {
        Command::Params => {
            let params = pipeline.protocol_parameters().await?;
            println!("{params:#?}");
        }
        Command::Utxos { address } => {
            for utxo in pipeline.utxos(&address).await? {
                println!("{utxo} {:?}", utxo.value);
            }
        }
        Command::Build {
            from,
            to,
            amount,
            deposit_owner,
            withdraw_owner,
        } => {
            let request = request(from, to, amount, deposit_owner, withdraw_owner)?;
            let unsigned = pipeline.build(&request).await?;

            println!("{}", unsigned.tx_hash);
            println!("{}", unsigned.hex());
        }
        Command::Sign { tx, witness } => {
            let tx = hex::decode(tx.trim()).context("transaction is not hex")?;
            let witness = hex::decode(witness.trim()).context("witness set is not hex")?;

            let signed = pipeline.sign(&tx, &witness)?;

            println!("{}", signed.tx_hash);
            println!("{}", signed.hex());
        }
        Command::Submit { tx } => {
            let tx = hex::decode(tx.trim()).context("transaction is not hex")?;

            match pipeline.submit(&tx).await {
                Ok(id) => println!("{id}"),
                Err(e) if e.is_retryable() => {
                    anyhow::bail!("{e}, rebuild the transaction before trying again")
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
