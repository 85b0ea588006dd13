//! One-shot genesis import.
//!
//! Seeds accounts and delegations from the genesis document before the
//! first live height is fetched. Nothing here is retried: a partial import
//! must stop the parser instead of silently continuing.

use std::collections::BTreeMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use tracing::{debug, info, instrument};

use crate::error::{DecodeError, IndexerError, IndexerResult};
use crate::models::{Account, Delegation, derived_id};
use crate::ports::{ChainNode, GenesisDoc, Repositories};

use super::amount::{ChainParams, parse_quantity};
use super::committer::KnownAddresses;

/// Accounts and delegations derived from a genesis document.
#[derive(Debug, Default)]
pub struct GenesisState {
    pub accounts: Vec<Account>,
    pub delegations: Vec<Delegation>,
}

/// Imports the genesis state once, when the checkpoint is still 0.
pub struct GenesisBootstrapper<N: ChainNode, R: Repositories> {
    node: Arc<N>,
    repositories: Arc<R>,
    params: ChainParams,
    batch_size: usize,
}

impl<N: ChainNode, R: Repositories> GenesisBootstrapper<N, R> {
    pub fn new(node: Arc<N>, repositories: Arc<R>, params: ChainParams, batch_size: usize) -> Self {
        Self {
            node,
            repositories,
            params,
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch, derive and persist the genesis state.
    ///
    /// Returns every address the import created an account for.
    #[instrument(skip_all)]
    pub async fn run(&self) -> IndexerResult<KnownAddresses> {
        info!("🌱 Importing genesis state");
        let genesis = self
            .node
            .genesis()
            .await
            .map_err(|e| IndexerError::Genesis(e.to_string()))?;

        let state = derive_state(&genesis, &self.params)
            .map_err(|e| IndexerError::Genesis(e.to_string()))?;

        for chunk in state.accounts.chunks(self.batch_size) {
            self.repositories.accounts().create_accounts(chunk).await?;
            debug!(count = chunk.len(), "Genesis accounts stored");
        }
        for chunk in state.delegations.chunks(self.batch_size) {
            self.repositories.facts().create_delegations(chunk).await?;
            debug!(count = chunk.len(), "Genesis delegations stored");
        }

        info!(
            accounts = state.accounts.len(),
            delegations = state.delegations.len(),
            "🌱 Genesis imported"
        );

        Ok(state.accounts.into_iter().map(|a| a.address).collect())
    }
}

/// Derive balances, stake and delegations.
///
/// Unbonding delegations present in genesis are ignored.
pub fn derive_state(genesis: &GenesisDoc, params: &ChainParams) -> Result<GenesisState, DecodeError> {
    let created_at = genesis.genesis_time;
    let zero = || BigDecimal::from(0);
    let mut balances: BTreeMap<String, BigDecimal> = BTreeMap::new();
    let mut stakes: BTreeMap<String, BigDecimal> = BTreeMap::new();
    let mut delegations = Vec::new();

    for account in &genesis.app_state.auth.accounts {
        if let Some(address) = auth_address(account) {
            balances.entry(address.to_string()).or_insert_with(zero);
        }
    }

    let app_state = &genesis.app_state;
    for balance in app_state.bank.balances.iter().chain(&app_state.accounts) {
        if balance.address.is_empty() {
            continue;
        }
        let mut total = zero();
        for coin in balance.coins.iter().filter(|c| c.denom == params.main_denom) {
            total += parse_quantity(&coin.amount)?;
        }
        *balances.entry(balance.address.clone()).or_insert_with(zero) += params.to_main_units(&total);
    }

    let staking = &genesis.app_state.staking;
    for delegation in &staking.delegations {
        let amount = params.to_main_units(&parse_quantity(&delegation.shares)?);
        *stakes
            .entry(delegation.delegator_address.clone())
            .or_insert_with(zero) += &amount;
        delegations.push(Delegation {
            id: derived_id(format!(
                "genesis.{}.{}",
                delegation.delegator_address, delegation.validator_address
            )),
            tx_hash: String::new(),
            delegator: delegation.delegator_address.clone(),
            validator: delegation.validator_address.clone(),
            amount,
            created_at,
        });
    }

    for redelegation in &staking.redelegations {
        for (n, entry) in redelegation.entries.iter().enumerate() {
            let amount = params.to_main_units(&parse_quantity(&entry.shares_dst)?);
            *stakes
                .entry(redelegation.delegator_address.clone())
                .or_insert_with(zero) += &amount;
            delegations.push(Delegation {
                id: derived_id(format!(
                    "genesis.{}.{}.{}.r.{n}",
                    redelegation.delegator_address,
                    redelegation.validator_src_address,
                    redelegation.validator_dst_address
                )),
                tx_hash: String::new(),
                delegator: redelegation.delegator_address.clone(),
                validator: redelegation.validator_dst_address.clone(),
                amount,
                created_at,
            });
        }
    }

    for address in stakes.keys() {
        balances.entry(address.clone()).or_insert_with(zero);
    }

    let accounts = balances
        .into_iter()
        .map(|(address, balance)| {
            let stake = stakes.remove(&address).unwrap_or_else(zero);
            Account {
                address,
                balance,
                stake,
                unbonding: zero(),
                created_at,
            }
        })
        .collect();

    Ok(GenesisState {
        accounts,
        delegations,
    })
}

/// Address of an auth account, whatever its `@type`.
fn auth_address(account: &serde_json::Value) -> Option<&str> {
    [
        "/address",
        "/base_account/address",
        "/base_vesting_account/base_account/address",
        "/value/address",
    ]
    .iter()
    .find_map(|pointer| account.pointer(pointer).and_then(|v| v.as_str()))
    .filter(|address| !address.is_empty())
}
