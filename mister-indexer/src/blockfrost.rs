use std::time::Duration;

use async_trait::async_trait;
use mister_txbuilder::{ProtocolParameters, UnspentOutput};
use pallas_crypto::hash::Hash;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{
    dto::{AddressUtxo, EpochParameters, ErrorBody, LatestBlock},
    Error, Indexer,
};

const PROJECT_ID_HEADER: &str = "project_id";

/// Page size of the address UTxO listing
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct BlockfrostConfig {
    pub base_url: String,
    pub project_id: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl BlockfrostConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct BlockfrostClient {
    client: Client,
    config: BlockfrostConfig,
}

impl BlockfrostClient {
    pub fn new(config: BlockfrostConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.project_id {
            Some(id) => request.header(PROJECT_ID_HEADER, id),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, Error> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(%url, "querying indexer");

        let response = self.authorize(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(Error::Unavailable(format!(
                "{} answered {}: {}",
                url,
                status,
                diagnostic(response).await
            ))),
        }
    }
}

async fn diagnostic(response: Response) -> String {
    match response.text().await {
        Ok(text) => ErrorBody::diagnostic(&text),
        Err(e) => e.to_string(),
    }
}

#[async_trait]
impl Indexer for BlockfrostClient {
    async fn protocol_parameters(&self) -> Result<ProtocolParameters, Error> {
        let dto: EpochParameters = self
            .get("/epochs/latest/parameters")
            .await?
            .ok_or_else(|| Error::Unavailable("no protocol parameters".into()))?;

        ProtocolParameters::try_from(dto)
    }

    async fn tip_slot(&self) -> Result<u64, Error> {
        let block: LatestBlock = self
            .get("/blocks/latest")
            .await?
            .ok_or_else(|| Error::Unavailable("no latest block".into()))?;

        block
            .slot
            .ok_or_else(|| Error::Decode("latest block has no slot".into()))
    }

    async fn utxos(&self, address: &str) -> Result<Vec<UnspentOutput>, Error> {
        let mut out = vec![];

        for page in 1.. {
            let path = format!("/addresses/{address}/utxos?count={PAGE_SIZE}&page={page}");

            let batch: Vec<AddressUtxo> = match self.get(&path).await? {
                Some(batch) => batch,
                None => break,
            };

            let done = batch.len() < PAGE_SIZE;

            for utxo in batch {
                out.push(UnspentOutput::try_from(utxo)?);
            }

            if done {
                break;
            }
        }

        debug!(address, count = out.len(), "fetched utxos");

        Ok(out)
    }

    async fn submit(&self, tx: &[u8]) -> Result<Hash<32>, Error> {
        let url = format!("{}/tx/submit", self.config.base_url);

        let response = self
            .authorize(self.client.post(&url))
            .header(CONTENT_TYPE, "application/cbor")
            .body(tx.to_vec())
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let id: String = response.json().await?;

            let id = id
                .parse()
                .map_err(|_| Error::Decode(format!("bad transaction id {id}")))?;

            info!(%id, "transaction accepted");
            return Ok(id);
        }

        let message = diagnostic(response).await;

        if status.is_client_error() {
            warn!(%status, %message, "transaction rejected");
            return Err(Error::Rejected(message));
        }

        Err(Error::Unavailable(format!("{status}: {message}")))
    }
}
