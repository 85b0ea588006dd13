//! Port trait for the remote full node.
//!
//! This trait defines the interface for fetching blocks, validator sets,
//! transactions and the genesis document from a Cosmos-SDK node.
//! Implementations live in the infrastructure layer (e.g., `cosmoscan-node`).
//!
//! The response types mirror the node's REST JSON closely enough to be
//! deserialized directly. Token amounts stay as integer minor-unit strings
//! until the decoder normalizes them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::ChainResult;

// =============================================================================
// Blocks
// =============================================================================

/// Block response (`blocks/{height}`).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeBlock {
    pub block_id: NodeBlockId,
    pub block: NodeBlockBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeBlockId {
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeBlockBody {
    pub header: NodeHeader,
    #[serde(default)]
    pub data: NodeBlockData,
    #[serde(default)]
    pub last_commit: NodeLastCommit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeHeader {
    #[serde(deserialize_with = "u64_from_str_or_number")]
    pub height: u64,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub proposer_address: String,
}

/// Base64-encoded raw transactions included in the block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeBlockData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub txs: Vec<String>,
}

/// Precommits for the previous height carried by this block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeLastCommit {
    #[serde(default, deserialize_with = "null_as_default")]
    pub signatures: Vec<NodeCommitSig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeCommitSig {
    /// Hex (legacy LCD) or base64 (gRPC gateway) consensus address.
    /// Empty or null for absent signatures.
    #[serde(default, deserialize_with = "null_as_default")]
    pub validator_address: String,
}

// =============================================================================
// Validator Sets
// =============================================================================

/// Validator set active at a height.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatorSet {
    #[serde(default)]
    pub validators: Vec<SetValidator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetValidator {
    /// Bech32 consensus address (`cosmosvalcons1...`).
    #[serde(default)]
    pub address: String,
    pub pub_key: NodePubKey,
    #[serde(default)]
    pub voting_power: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodePubKey {
    #[serde(rename = "@type", default)]
    pub type_url: String,
    /// Base64 key bytes.
    pub key: String,
}

// =============================================================================
// Transactions
// =============================================================================

/// Transaction detail response (`cosmos/tx/v1beta1/txs/{hash}`).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeTx {
    pub tx: NodeTxEnvelope,
    pub tx_response: NodeTxResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTxEnvelope {
    pub body: NodeTxBody,
    #[serde(default)]
    pub auth_info: NodeAuthInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTxBody {
    /// Raw messages, each tagged with an `@type` URL.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeAuthInfo {
    #[serde(default)]
    pub fee: NodeFee,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeFee {
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTxResponse {
    #[serde(deserialize_with = "u64_from_str_or_number")]
    pub height: u64,
    #[serde(default)]
    pub txhash: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<TxLog>,
    /// Flat event list reported by newer nodes alongside (or instead of) logs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<TxEvent>,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub gas_used: u64,
    pub timestamp: DateTime<Utc>,
}

/// Per-message execution log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxLog {
    #[serde(default)]
    pub msg_index: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<TxEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

/// Amount of a single denomination, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct Coin {
    #[serde(default)]
    pub denom: String,
    #[serde(default)]
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

impl NodeTx {
    /// Events emitted for the message at `index`.
    ///
    /// Uses the per-message log when the node provides one, otherwise every
    /// event of the transaction.
    pub fn events_for_message(&self, index: usize) -> Vec<&TxEvent> {
        let logs = &self.tx_response.logs;
        let per_message = logs
            .iter()
            .find(|log| log.msg_index == Some(index as u32))
            .or_else(|| {
                (logs.len() == self.tx.body.messages.len() && logs.len() > 1)
                    .then(|| &logs[index])
                    .filter(|log| log.msg_index.is_none())
            });

        match per_message {
            Some(log) => log.events.iter().collect(),
            None => logs
                .iter()
                .flat_map(|log| log.events.iter())
                .chain(self.tx_response.events.iter())
                .collect(),
        }
    }
}

// =============================================================================
// Genesis
// =============================================================================

/// Genesis document, reduced to what the bootstrap needs.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDoc {
    pub genesis_time: DateTime<Utc>,
    #[serde(default)]
    pub app_state: GenesisAppState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisAppState {
    #[serde(default)]
    pub auth: GenesisAuth,
    #[serde(default)]
    pub bank: GenesisBank,
    #[serde(default)]
    pub staking: GenesisStaking,
    /// Pre-Stargate layout (cosmoshub-1 to 3): accounts carry their coins.
    #[serde(default, deserialize_with = "null_as_default")]
    pub accounts: Vec<GenesisBalance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisAuth {
    /// Accounts of heterogeneous `@type`s, kept raw.
    #[serde(default)]
    pub accounts: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisBank {
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisBalance {
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisStaking {
    #[serde(default, deserialize_with = "null_as_default")]
    pub delegations: Vec<GenesisDelegation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub redelegations: Vec<GenesisRedelegation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDelegation {
    pub delegator_address: String,
    pub validator_address: String,
    /// Decimal shares string in minor units.
    pub shares: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisRedelegation {
    pub delegator_address: String,
    pub validator_src_address: String,
    pub validator_dst_address: String,
    #[serde(default)]
    pub entries: Vec<GenesisRedelegationEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisRedelegationEntry {
    pub shares_dst: String,
}

// =============================================================================
// Port Trait
// =============================================================================

/// Port trait for the remote full node.
///
/// Every error is treated as transient by the parser, except when fetching
/// the genesis document during bootstrap.
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Latest block known to the node.
    async fn latest_block(&self) -> ChainResult<NodeBlock>;

    /// Block at a given height.
    async fn block(&self, height: u64) -> ChainResult<NodeBlock>;

    /// Full validator set at a given height (all pages).
    async fn validator_set(&self, height: u64) -> ChainResult<ValidatorSet>;

    /// Transaction detail by uppercase hex hash.
    async fn transaction(&self, hash: &str) -> ChainResult<NodeTx>;

    /// The chain's genesis document.
    async fn genesis(&self) -> ChainResult<GenesisDoc>;
}

// =============================================================================
// Serde helpers
// =============================================================================

/// Accept `"123"` as well as `123`.
fn u64_from_str_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }

    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Num(n) => Ok(n),
        StrOrNum::Str(s) if s.is_empty() => Ok(0),
        StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Format renvoyé par l'endpoint legacy `blocks/{height}`
    #[test]
    fn test_block_deserializes_lcd_format() {
        let raw = json!({
            "block_id": { "hash": "4A5B", "parts": { "total": 1, "hash": "00" } },
            "block": {
                "header": {
                    "chain_id": "cosmoshub-4",
                    "height": "5200792",
                    "time": "2021-02-18T06:00:00.000000Z",
                    "proposer_address": "83F47D7747B0F633A6BA0DF49B7DCF61F90AA1B0"
                },
                "data": { "txs": ["CpIBCo8B"] },
                "last_commit": {
                    "height": "5200791",
                    "signatures": [
                        { "block_id_flag": 2, "validator_address": "AAAA" },
                        { "block_id_flag": 1, "validator_address": null }
                    ]
                }
            }
        });

        let block: NodeBlock = serde_json::from_value(raw).unwrap();
        assert_eq!(block.block.header.height, 5_200_792);
        assert_eq!(block.block.data.txs.len(), 1);
        assert_eq!(block.block.last_commit.signatures.len(), 2);
        assert_eq!(block.block.last_commit.signatures[1].validator_address, "");
    }

    // Les blocs vides renvoient `txs: null`
    #[test]
    fn test_block_with_null_txs() {
        let raw = json!({
            "block_id": { "hash": "AB" },
            "block": {
                "header": { "height": "1", "time": "2019-12-11T16:11:34Z" },
                "data": { "txs": null },
                "last_commit": { "signatures": [] }
            }
        });
        let block: NodeBlock = serde_json::from_value(raw).unwrap();
        assert!(block.block.data.txs.is_empty());
    }

    #[test]
    fn test_tx_deserializes_numeric_strings() {
        let raw = json!({
            "tx": {
                "body": { "messages": [{ "@type": "/cosmos.slashing.v1beta1.MsgUnjail" }], "memo": "" },
                "auth_info": { "fee": { "amount": [{ "denom": "uatom", "amount": "5000" }], "gas_limit": "200000" } }
            },
            "tx_response": {
                "height": "42",
                "txhash": "DEAD",
                "code": 0,
                "logs": [],
                "gas_wanted": "200000",
                "gas_used": "81234",
                "timestamp": "2021-02-18T06:00:00Z"
            }
        });
        let tx: NodeTx = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.tx_response.height, 42);
        assert_eq!(tx.tx_response.gas_used, 81_234);
        assert_eq!(tx.tx.auth_info.fee.amount[0], Coin::new("uatom", "5000"));
    }

    // Test critique: les événements d'un message viennent de son propre log
    #[test]
    fn test_events_for_message_prefers_message_log() {
        let raw = json!({
            "tx": { "body": { "messages": [{ "@type": "a" }, { "@type": "b" }] } },
            "tx_response": {
                "height": "1",
                "txhash": "AA",
                "logs": [
                    { "msg_index": 0, "events": [{ "type": "first", "attributes": [] }] },
                    { "msg_index": 1, "events": [{ "type": "second", "attributes": [] }] }
                ],
                "timestamp": "2021-02-18T06:00:00Z"
            }
        });
        let tx: NodeTx = serde_json::from_value(raw).unwrap();
        let events = tx.events_for_message(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "second");
    }

    #[test]
    fn test_events_for_message_falls_back_to_flat_events() {
        let raw = json!({
            "tx": { "body": { "messages": [{ "@type": "a" }] } },
            "tx_response": {
                "height": "1",
                "txhash": "AA",
                "logs": [],
                "events": [{ "type": "withdraw_commission", "attributes": [{ "key": "amount", "value": "10uatom" }] }],
                "timestamp": "2021-02-18T06:00:00Z"
            }
        });
        let tx: NodeTx = serde_json::from_value(raw).unwrap();
        let events = tx.events_for_message(0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "withdraw_commission");
    }

    #[test]
    fn test_genesis_ignores_unknown_sections() {
        let raw = json!({
            "genesis_time": "2019-12-11T16:11:34Z",
            "chain_id": "cosmoshub-4",
            "validators": [],
            "app_state": {
                "auth": { "accounts": [{ "@type": "/cosmos.auth.v1beta1.BaseAccount", "address": "cosmos1a" }] },
                "bank": { "balances": [{ "address": "cosmos1a", "coins": [{ "denom": "uatom", "amount": "10" }] }] },
                "staking": { "delegations": null, "unbonding_delegations": [{ "delegator_address": "cosmos1a" }] },
                "gov": {}
            }
        });
        let genesis: GenesisDoc = serde_json::from_value(raw).unwrap();
        assert_eq!(genesis.app_state.bank.balances.len(), 1);
        assert!(genesis.app_state.staking.delegations.is_empty());
    }
}
