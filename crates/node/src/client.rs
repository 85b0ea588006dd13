//! Cosmos LCD client implementing the [`ChainNode`] port.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};
use url::Url;

use cosmoscan_core::error::{ChainError, ChainResult};
use cosmoscan_core::ports::{ChainNode, GenesisDoc, NodeBlock, NodeTx, SetValidator, ValidatorSet};

/// Cosmos Hub launch genesis.
pub const DEFAULT_GENESIS_SOURCE: &str =
    "https://raw.githubusercontent.com/cosmos/launch/master/genesis.json";

/// Longest response body kept in a [`ChainError::BadStatus`].
const MAX_ERROR_BODY: usize = 150;

/// Configuration for the LCD client.
#[derive(Debug, Clone)]
pub struct LcdClientConfig {
    /// REST endpoint of the node (e.g., "http://localhost:1317").
    pub base_url: String,
    /// Genesis document location: an `http(s)://` URL or a file path.
    pub genesis_source: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for LcdClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1317".to_string(),
            genesis_source: DEFAULT_GENESIS_SOURCE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Where the genesis document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenesisSource {
    Url(Url),
    File(PathBuf),
}

impl GenesisSource {
    pub fn parse(source: &str) -> Self {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => GenesisSource::Url(url),
            _ => GenesisSource::File(PathBuf::from(source)),
        }
    }
}

/// LCD (REST) client adapter implementing the ChainNode port.
pub struct LcdClient {
    http: Client,
    base_url: String,
    genesis: GenesisSource,
}

impl LcdClient {
    /// Build a client. No request is sent until the first call.
    pub fn new(config: LcdClientConfig) -> ChainResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ChainError::RequestFailed(format!("invalid node url {}: {e}", config.base_url)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("cosmoscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChainError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            genesis: GenesisSource::parse(&config.genesis_source),
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// GET `endpoint` and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> ChainResult<T> {
        trace!(endpoint, "GET");
        let response = self
            .http
            .get(self.endpoint_url(endpoint))
            .query(query)
            .send()
            .await
            .map_err(|e| ChainError::RequestFailed(format!("{endpoint}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChainError::RequestFailed(format!("{endpoint}: {e}")))?;

        if !status.is_success() {
            return Err(ChainError::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ChainError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn read_genesis(&self) -> ChainResult<Vec<u8>> {
        match &self.genesis {
            GenesisSource::Url(url) => {
                let response = self
                    .http
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| ChainError::GenesisUnavailable(format!("{url}: {e}")))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ChainError::GenesisUnavailable(format!("{url}: status {status}")));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ChainError::GenesisUnavailable(format!("{url}: {e}")))?;
                Ok(bytes.to_vec())
            }
            GenesisSource::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ChainError::GenesisUnavailable(format!("{}: {e}", path.display()))),
        }
    }
}

#[async_trait]
impl ChainNode for LcdClient {
    async fn latest_block(&self) -> ChainResult<NodeBlock> {
        self.get("blocks/latest", &[]).await
    }

    async fn block(&self, height: u64) -> ChainResult<NodeBlock> {
        self.get(&format!("blocks/{height}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn validator_set(&self, height: u64) -> ChainResult<ValidatorSet> {
        let endpoint = format!("cosmos/base/tendermint/v1beta1/validatorsets/{height}");
        let mut validators = Vec::new();
        let mut next_key: Option<String> = None;

        loop {
            let page: ValidatorSetPage = match next_key.as_deref() {
                Some(key) => self.get(&endpoint, &[("pagination.key", key)]).await?,
                None => self.get(&endpoint, &[]).await?,
            };
            let (page_validators, page_next) = page.into_parts();
            validators.extend(page_validators);

            match page_next {
                Some(key) if next_key.as_deref() != Some(key.as_str()) => next_key = Some(key),
                _ => break,
            }
        }

        debug!(count = validators.len(), "Validator set loaded");
        Ok(ValidatorSet { validators })
    }

    async fn transaction(&self, hash: &str) -> ChainResult<NodeTx> {
        self.get(&format!("cosmos/tx/v1beta1/txs/{hash}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn genesis(&self) -> ChainResult<GenesisDoc> {
        debug!(source = ?self.genesis, "Loading genesis document");
        let bytes = self.read_genesis().await?;
        parse_genesis(&bytes)
    }
}

// =============================================================================
// Response helpers
// =============================================================================

/// One page of `validatorsets/{height}`.
#[derive(Debug, Deserialize)]
struct ValidatorSetPage {
    #[serde(default)]
    validators: Vec<SetValidator>,
    #[serde(default)]
    pagination: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    next_key: Option<String>,
}

impl ValidatorSetPage {
    fn next_key(&self) -> Option<String> {
        self.pagination
            .as_ref()
            .and_then(|p| p.next_key.clone())
            .filter(|key| !key.is_empty())
    }

    /// Split into the page's validators and the key of the next page.
    fn into_parts(self) -> (Vec<SetValidator>, Option<String>) {
        let next = self.next_key();
        (self.validators, next)
    }
}

/// Decode a genesis document, unwrapping the RPC `{"result":{"genesis":..}}` envelope.
fn parse_genesis(bytes: &[u8]) -> ChainResult<GenesisDoc> {
    let invalid = |e: serde_json::Error| ChainError::GenesisUnavailable(format!("invalid genesis: {e}"));

    let mut value: serde_json::Value = serde_json::from_slice(bytes).map_err(invalid)?;
    if let Some(inner) = value.pointer_mut("/result/genesis") {
        value = inner.take();
    }
    serde_json::from_value(value).map_err(invalid)
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}
