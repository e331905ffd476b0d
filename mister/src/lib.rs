//! Builds, signs and submits Cardano transactions against a script vault.
//!
//! [`Pipeline`] wires the chain queries of an [`Indexer`](mister_indexer::Indexer)
//! into the pure builders of `mister-txbuilder`. Signing keys never reach this
//! crate, callers sign the unsigned body elsewhere and hand back a witness set.

mod error;
mod pipeline;
mod settings;

pub use error::Error;
pub use pipeline::{BuildRequest, Pipeline, PipelineOptions, VaultOptions};
pub use settings::{NetworkSettings, Settings, VaultSettings};
