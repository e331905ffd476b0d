use std::{collections::BTreeMap, path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use mister_indexer::BlockfrostConfig;
use mister_txbuilder::{DatumMode, ExecutionUnits, PlutusScript, PlutusVersion};
use pallas_addresses::{Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_codec::minicbor;
use serde::Deserialize;

use crate::pipeline::{PipelineOptions, VaultOptions};

const DEFAULT_CONFIG: &str = "mister.toml";
const ENV_PREFIX: &str = "MISTER";

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_ttl_offset() -> u64 {
    7200
}

fn default_fee_buffer() -> u64 {
    300_000
}

fn default_min_collateral() -> u64 {
    5_000_000
}

/// Indexer endpoint and fee policy of one network
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkSettings {
    pub base_url: String,
    pub project_id: Option<String>,

    /// Selects the address network tag, testnet otherwise
    #[serde(default)]
    pub mainnet: bool,

    /// Lovelace reserved on top of the amount when selecting a funding input
    #[serde(default = "default_fee_buffer")]
    pub fee_buffer: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VaultSettings {
    pub language: PlutusVersion,

    /// Hex of the script as a single CBOR byte string, the `compiledCode`
    /// of a plutus.json blueprint. A cardano-cli `cborHex` is unwrapped once.
    pub script: String,

    #[serde(default)]
    pub datum_mode: DatumMode,

    pub ex_units: ExecutionUnits,

    #[serde(default = "default_min_collateral")]
    pub min_collateral: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Key into `networks` selecting the active one
    pub network: String,

    pub networks: BTreeMap<String, NetworkSettings>,

    /// Whole-request timeout for indexer calls, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Slots added to the tip to obtain the validity upper bound
    #[serde(default = "default_ttl_offset")]
    pub ttl_offset: u64,

    pub vault: Option<VaultSettings>,
}

impl Settings {
    /// Reads `path` (or `mister.toml` when present), then `MISTER_*` variables.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `MISTER_NETWORKS__PREPROD__PROJECT_ID`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_offset == 0 {
            return Err(ConfigError::Message("ttl_offset must be positive".into()));
        }

        self.active_network()?;

        if let Some(vault) = &self.vault {
            decode_script(vault)?;
        }

        Ok(())
    }

    pub fn active_network(&self) -> Result<&NetworkSettings, ConfigError> {
        self.networks
            .get(&self.network)
            .ok_or_else(|| ConfigError::NotFound(format!("networks.{}", self.network)))
    }

    pub fn indexer(&self) -> Result<BlockfrostConfig, ConfigError> {
        let network = self.active_network()?;

        let mut config = BlockfrostConfig::new(&network.base_url);
        config.project_id = network.project_id.clone();
        config.timeout = Duration::from_secs(self.timeout);
        config.connect_timeout = Duration::from_secs(self.connect_timeout);

        Ok(config)
    }

    pub fn pipeline(&self) -> Result<PipelineOptions, ConfigError> {
        let network = self.active_network()?;

        let vault = match &self.vault {
            Some(vault) => {
                let script = decode_script(vault)?;

                Some(VaultOptions {
                    address: script_address(&script, network.mainnet)?,
                    script,
                    datum_mode: vault.datum_mode,
                    ex_units: vault.ex_units,
                    min_collateral: vault.min_collateral,
                })
            }
            None => None,
        };

        Ok(PipelineOptions {
            ttl_offset: self.ttl_offset,
            fee_buffer: network.fee_buffer,
            vault,
        })
    }
}

fn decode_script(vault: &VaultSettings) -> Result<PlutusScript, ConfigError> {
    let bytes = hex::decode(vault.script.trim())
        .map_err(|e| ConfigError::Message(format!("vault.script is not hex: {e}")))?;

    if bytes.is_empty() {
        return Err(ConfigError::Message("vault.script is empty".into()));
    }

    Ok(PlutusScript::new(vault.language, single_wrapped(bytes)?))
}

/// Drops the extra byte string layer of a doubly wrapped script, the hash
/// and the witness set both take the flat program wrapped exactly once.
fn single_wrapped(bytes: Vec<u8>) -> Result<Vec<u8>, ConfigError> {
    let mut outer = minicbor::Decoder::new(&bytes);

    let inner = outer
        .bytes()
        .map_err(|e| ConfigError::Message(format!("vault.script is not a CBOR byte string: {e}")))?;

    if outer.position() != bytes.len() {
        return Err(ConfigError::Message("vault.script has trailing bytes".into()));
    }

    let mut nested = minicbor::Decoder::new(inner);

    if nested.bytes().is_ok() && nested.position() == inner.len() {
        tracing::debug!("unwrapping doubly wrapped vault script");
        return Ok(inner.to_vec());
    }

    Ok(bytes)
}

/// Enterprise address paying to the script hash
fn script_address(script: &PlutusScript, mainnet: bool) -> Result<String, ConfigError> {
    let network = if mainnet { Network::Mainnet } else { Network::Testnet };

    let address: Address = ShelleyAddress::new(
        network,
        ShelleyPaymentPart::script_hash(script.hash()),
        ShelleyDelegationPart::Null,
    )
    .into();

    address
        .to_bech32()
        .map_err(|e| ConfigError::Message(format!("vault address: {e}")))
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    const SAMPLE: &str = r#"
        network = "preprod"
        ttl_offset = 900

        [networks.preprod]
        base_url = "https://cardano-preprod.blockfrost.io/api/v0/"
        fee_buffer = 250000

        [vault]
        language = "v2"
        script = "4d01000033222220051200120011"
        ex_units = { mem = 1400000, steps = 500000000 }
    "#;

    fn parse(raw: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn sample_resolves_the_active_network() {
        let settings = parse(SAMPLE).unwrap();

        assert_eq!(settings.timeout, 30);

        let indexer = settings.indexer().unwrap();
        assert_eq!(indexer.base_url, "https://cardano-preprod.blockfrost.io/api/v0");
        assert_eq!(indexer.project_id, None);

        let options = settings.pipeline().unwrap();
        assert_eq!(options.ttl_offset, 900);
        assert_eq!(options.fee_buffer, 250_000);

        let vault = options.vault.unwrap();
        assert_eq!(vault.datum_mode, DatumMode::Hash);
        assert_eq!(vault.min_collateral, 5_000_000);
        assert_eq!(vault.script.version, PlutusVersion::V2);
        assert!(vault.address.starts_with("addr_test1w"));
    }

    #[test]
    fn zero_ttl_offset_is_refused() {
        let raw = SAMPLE.replace("ttl_offset = 900", "ttl_offset = 0");
        assert!(parse(&raw).is_err());
    }

    #[test]
    fn unknown_network_is_refused() {
        let raw = SAMPLE.replace("network = \"preprod\"", "network = \"mainnet\"");
        assert!(matches!(parse(&raw), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn script_must_be_hex() {
        let raw = SAMPLE.replace("4d01000033222220051200120011", "not-hex");
        assert!(parse(&raw).is_err());

        // flat program without its byte string header
        let raw = SAMPLE.replace("4d01000033222220051200120011", "01000033222220051200120011");
        assert!(parse(&raw).is_err());
    }

    /// Script bytes hold one byte string header around a flat program
    fn assert_single_wrapped(script: &PlutusScript) {
        let mut decoder = minicbor::Decoder::new(&script.bytes);
        let flat = decoder.bytes().unwrap();

        assert_eq!(decoder.position(), script.bytes.len());
        assert!(!(0x40..=0x5f).contains(&flat[0]), "nested byte string header {:#x}", flat[0]);
    }

    #[test]
    fn shipped_config_holds_a_single_wrapped_script() {
        let settings = parse(include_str!("../mister.toml")).unwrap();
        let vault = settings.pipeline().unwrap().vault.unwrap();

        assert_single_wrapped(&vault.script);
        assert_eq!(
            hex::encode(&vault.script.bytes),
            "581c01000033223232222350040071235002353003001498498480048005"
        );
        assert!(vault.address.starts_with("addr_test1w"));
    }

    #[test]
    fn cli_envelope_is_unwrapped_once() {
        let single = parse(SAMPLE).unwrap().pipeline().unwrap().vault.unwrap();

        let raw = SAMPLE.replace("4d01000033222220051200120011", "4e4d01000033222220051200120011");
        let double = parse(&raw).unwrap().pipeline().unwrap().vault.unwrap();

        assert_single_wrapped(&double.script);
        assert_eq!(double.script, single.script);
        assert_eq!(double.address, single.address);
    }
}
