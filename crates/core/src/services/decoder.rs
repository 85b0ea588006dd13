//! Transaction message decoder.
//!
//! Turns the raw JSON messages of a successful transaction into domain
//! facts. The decoder is deliberately partial: message types it does not
//! know produce no facts and no error.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{DecodeError, DecodeResult};
use crate::models::{
    Delegation, DelegatorReward, Fact, HistoryProposal, Jailer, ProposalDeposit, ProposalVote,
    Transfer, ValidatorReward, VoteOption, derived_id,
};
use crate::ports::{Coin, NodeTx, TxEvent};

use super::amount::ChainParams;

// =============================================================================
// Message Kinds
// =============================================================================

/// Message types that produce facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Send,
    MultiSend,
    Delegate,
    Undelegate,
    BeginRedelegate,
    WithdrawDelegatorReward,
    WithdrawValidatorCommission,
    SubmitProposal,
    Deposit,
    Vote,
    Unjail,
}

impl MessageKind {
    /// Resolve a message `@type` URL.
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        let kind = match type_url {
            "/cosmos.bank.v1beta1.MsgSend" => Self::Send,
            "/cosmos.bank.v1beta1.MsgMultiSend" => Self::MultiSend,
            "/cosmos.staking.v1beta1.MsgDelegate" => Self::Delegate,
            "/cosmos.staking.v1beta1.MsgUndelegate" => Self::Undelegate,
            "/cosmos.staking.v1beta1.MsgBeginRedelegate" => Self::BeginRedelegate,
            "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward" => {
                Self::WithdrawDelegatorReward
            }
            "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission" => {
                Self::WithdrawValidatorCommission
            }
            "/cosmos.gov.v1beta1.MsgSubmitProposal" => Self::SubmitProposal,
            "/cosmos.gov.v1beta1.MsgDeposit" | "/cosmos.gov.v1.MsgDeposit" => Self::Deposit,
            "/cosmos.gov.v1beta1.MsgVote" | "/cosmos.gov.v1.MsgVote" => Self::Vote,
            "/cosmos.slashing.v1beta1.MsgUnjail" => Self::Unjail,
            _ => return None,
        };
        Some(kind)
    }
}

// =============================================================================
// Message Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct MsgSend {
    #[serde(default)]
    from_address: String,
    #[serde(default)]
    to_address: String,
    #[serde(default)]
    amount: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgMultiSend {
    #[serde(default)]
    inputs: Vec<MultiSendLeg>,
    #[serde(default)]
    outputs: Vec<MultiSendLeg>,
}

#[derive(Debug, Deserialize)]
struct MultiSendLeg {
    address: String,
    #[serde(default)]
    coins: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgDelegate {
    delegator_address: String,
    validator_address: String,
    amount: Coin,
}

#[derive(Debug, Deserialize)]
struct MsgBeginRedelegate {
    delegator_address: String,
    validator_src_address: String,
    validator_dst_address: String,
    amount: Coin,
}

#[derive(Debug, Deserialize)]
struct MsgWithdrawDelegatorReward {
    delegator_address: String,
    validator_address: String,
}

#[derive(Debug, Deserialize)]
struct MsgWithdrawValidatorCommission {
    validator_address: String,
}

#[derive(Debug, Deserialize)]
struct MsgSubmitProposal {
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    initial_deposit: Vec<Coin>,
    #[serde(default)]
    proposer: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProposalContent {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    recipient: String,
    #[serde(default)]
    amount: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgDeposit {
    proposal_id: serde_json::Value,
    depositor: String,
    #[serde(default)]
    amount: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgVote {
    proposal_id: serde_json::Value,
    voter: String,
    option: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MsgUnjail {
    validator_addr: String,
}

// =============================================================================
// MessageDecoder
// =============================================================================

/// Decodes transaction messages into facts.
#[derive(Debug, Clone, Default)]
pub struct MessageDecoder {
    params: ChainParams,
}

impl MessageDecoder {
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Decode message `index` of `tx`.
    ///
    /// Returns an empty list for unknown message types.
    pub fn decode(
        &self,
        index: usize,
        message: &serde_json::Value,
        tx: &NodeTx,
    ) -> DecodeResult<Vec<Fact>> {
        let type_url = message
            .get("@type")
            .and_then(|t| t.as_str())
            .unwrap_or_default();

        let Some(kind) = MessageKind::from_type_url(type_url) else {
            trace!(type_url, "Ignoring message type");
            return Ok(Vec::new());
        };

        let ctx = MessageContext {
            index,
            type_url,
            tx,
            params: &self.params,
        };

        match kind {
            MessageKind::Send => ctx.send(message),
            MessageKind::MultiSend => ctx.multi_send(message),
            MessageKind::Delegate => ctx.delegate(message, false),
            MessageKind::Undelegate => ctx.delegate(message, true),
            MessageKind::BeginRedelegate => ctx.redelegate(message),
            MessageKind::WithdrawDelegatorReward => ctx.delegator_reward(message),
            MessageKind::WithdrawValidatorCommission => ctx.validator_commission(message),
            MessageKind::SubmitProposal => ctx.submit_proposal(message),
            MessageKind::Deposit => ctx.deposit(message),
            MessageKind::Vote => ctx.vote(message),
            MessageKind::Unjail => ctx.unjail(message),
        }
    }
}

/// Per-message decoding state.
struct MessageContext<'a> {
    index: usize,
    type_url: &'a str,
    tx: &'a NodeTx,
    params: &'a ChainParams,
}

impl MessageContext<'_> {
    fn hash(&self) -> &str {
        &self.tx.tx_response.txhash
    }

    fn id(&self, suffix: &str) -> String {
        derived_id(format!("{}.{}{}", self.hash(), self.index, suffix))
    }

    fn parse<T: DeserializeOwned>(&self, message: &serde_json::Value) -> DecodeResult<T> {
        T::deserialize(message).map_err(|e| DecodeError::Malformed {
            message: self.type_url.to_string(),
            reason: e.to_string(),
        })
    }

    fn events(&self, kind: &str) -> Vec<&TxEvent> {
        self.tx
            .events_for_message(self.index)
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }

    fn send(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgSend = self.parse(message)?;
        let (amount, currency) = self.params.currency_amount(&msg.amount)?;
        Ok(vec![Fact::Transfer(Transfer {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            from: msg.from_address,
            to: msg.to_address,
            amount,
            currency,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn multi_send(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgMultiSend = self.parse(message)?;
        let mut facts = Vec::with_capacity(msg.inputs.len() + msg.outputs.len());

        for (n, input) in msg.inputs.into_iter().enumerate() {
            let (amount, currency) = self.params.currency_amount(&input.coins)?;
            facts.push(Fact::Transfer(Transfer {
                id: self.id(&format!(".i.{n}")),
                tx_hash: self.hash().to_string(),
                from: input.address,
                to: String::new(),
                amount,
                currency,
                created_at: self.tx.tx_response.timestamp,
            }));
        }
        for (n, output) in msg.outputs.into_iter().enumerate() {
            let (amount, currency) = self.params.currency_amount(&output.coins)?;
            facts.push(Fact::Transfer(Transfer {
                id: self.id(&format!(".o.{n}")),
                tx_hash: self.hash().to_string(),
                from: String::new(),
                to: output.address,
                amount,
                currency,
                created_at: self.tx.tx_response.timestamp,
            }));
        }

        Ok(facts)
    }

    fn delegate(&self, message: &serde_json::Value, negate: bool) -> DecodeResult<Vec<Fact>> {
        let msg: MsgDelegate = self.parse(message)?;
        let amount = self.params.main_coin(&msg.amount)?;
        Ok(vec![Fact::Delegation(Delegation {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            delegator: msg.delegator_address,
            validator: msg.validator_address,
            amount: if negate { -amount } else { amount },
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn redelegate(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgBeginRedelegate = self.parse(message)?;
        let amount = self.params.main_coin(&msg.amount)?;
        let created_at = self.tx.tx_response.timestamp;

        Ok(vec![
            Fact::Delegation(Delegation {
                id: self.id(".s"),
                tx_hash: self.hash().to_string(),
                delegator: msg.delegator_address.clone(),
                validator: msg.validator_src_address,
                amount: -amount.clone(),
                created_at,
            }),
            Fact::Delegation(Delegation {
                id: self.id(".d"),
                tx_hash: self.hash().to_string(),
                delegator: msg.delegator_address,
                validator: msg.validator_dst_address,
                amount,
                created_at,
            }),
        ])
    }

    /// The reward amount only exists in the `withdraw_rewards` event, as
    /// amount/validator attribute pairs.
    fn delegator_reward(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgWithdrawDelegatorReward = self.parse(message)?;

        let mut found: Option<BigDecimal> = None;
        for event in self.events("withdraw_rewards") {
            let mut pending = BigDecimal::from(0);
            for attr in &event.attributes {
                match attr.key.as_str() {
                    "amount" => pending = self.params.event_amount(&attr.value)?,
                    "validator" => {
                        if attr.value == msg.validator_address {
                            found = Some(std::mem::take(&mut pending));
                        } else {
                            pending = BigDecimal::from(0);
                        }
                    }
                    _ => {}
                }
            }
        }

        let amount = found.ok_or_else(|| {
            DecodeError::MissingEvent(format!(
                "withdraw_rewards for validator {}",
                msg.validator_address
            ))
        })?;

        Ok(vec![Fact::DelegatorReward(DelegatorReward {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            delegator: msg.delegator_address,
            validator: msg.validator_address,
            amount,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn validator_commission(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgWithdrawValidatorCommission = self.parse(message)?;

        let mut found = None;
        for event in self.events("withdraw_commission") {
            for attr in event.attributes.iter().filter(|a| a.key == "amount") {
                found = Some(self.params.event_amount(&attr.value)?);
            }
        }
        let amount =
            found.ok_or_else(|| DecodeError::MissingEvent("withdraw_commission amount".into()))?;

        Ok(vec![Fact::ValidatorReward(ValidatorReward {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            address: msg.validator_address,
            amount,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn submit_proposal(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgSubmitProposal = self.parse(message)?;

        let mut proposal_id = 0;
        for event in self.events("submit_proposal") {
            for attr in event.attributes.iter().filter(|a| a.key == "proposal_id") {
                proposal_id = attr
                    .value
                    .parse()
                    .map_err(|_| DecodeError::MissingEvent(format!("proposal_id {}", attr.value)))?;
            }
        }
        if proposal_id == 0 {
            return Err(DecodeError::MissingEvent("submit_proposal proposal_id".into()));
        }

        // Amino JSON nests the content under `value`.
        let content_json = match msg.content.get("value") {
            Some(inner) if inner.is_object() => inner,
            _ => &msg.content,
        };
        let content: ProposalContent = if content_json.is_null() {
            ProposalContent::default()
        } else {
            self.parse(content_json)?
        };

        Ok(vec![Fact::Proposal(HistoryProposal {
            id: proposal_id,
            tx_hash: self.hash().to_string(),
            title: content.title,
            description: content.description,
            recipient: content.recipient,
            amount: self.params.main_amount(&content.amount)?,
            init_deposit: self.params.main_amount(&msg.initial_deposit)?,
            proposer: msg.proposer,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn deposit(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgDeposit = self.parse(message)?;
        Ok(vec![Fact::ProposalDeposit(ProposalDeposit {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            proposal_id: self.proposal_id(&msg.proposal_id)?,
            depositor: msg.depositor,
            amount: self.params.main_amount(&msg.amount)?,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn vote(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgVote = self.parse(message)?;
        Ok(vec![Fact::ProposalVote(ProposalVote {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            proposal_id: self.proposal_id(&msg.proposal_id)?,
            voter: msg.voter,
            option: parse_vote_option(&msg.option)?,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    fn unjail(&self, message: &serde_json::Value) -> DecodeResult<Vec<Fact>> {
        let msg: MsgUnjail = self.parse(message)?;
        Ok(vec![Fact::Jailer(Jailer {
            id: self.id(""),
            tx_hash: self.hash().to_string(),
            address: msg.validator_addr,
            created_at: self.tx.tx_response.timestamp,
        })])
    }

    /// Proposal ids come as strings in proto JSON.
    fn proposal_id(&self, value: &serde_json::Value) -> DecodeResult<u64> {
        let parsed = match value {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        };
        parsed.ok_or_else(|| DecodeError::Malformed {
            message: self.type_url.to_string(),
            reason: format!("invalid proposal_id {value}"),
        })
    }
}

/// Map a vote option (`VOTE_OPTION_*` or its numeric form) to [`VoteOption`].
pub fn parse_vote_option(value: &serde_json::Value) -> DecodeResult<VoteOption> {
    let option = match value {
        serde_json::Value::String(s) => match s.as_str() {
            "VOTE_OPTION_YES" | "1" => Some(VoteOption::Yes),
            "VOTE_OPTION_ABSTAIN" | "2" => Some(VoteOption::Abstain),
            "VOTE_OPTION_NO" | "3" => Some(VoteOption::No),
            "VOTE_OPTION_NO_WITH_VETO" | "4" => Some(VoteOption::NoWithVeto),
            _ => None,
        },
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(1) => Some(VoteOption::Yes),
            Some(2) => Some(VoteOption::Abstain),
            Some(3) => Some(VoteOption::No),
            Some(4) => Some(VoteOption::NoWithVeto),
            _ => None,
        },
        _ => None,
    };
    option.ok_or_else(|| DecodeError::UnknownVoteOption(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::str::FromStr;

    const HASH: &str = "9F1A4C0E4B0D8F2A";

    fn tx_with(messages: Vec<Value>, logs: Value) -> NodeTx {
        serde_json::from_value(json!({
            "tx": { "body": { "messages": messages } },
            "tx_response": {
                "height": "100",
                "txhash": HASH,
                "code": 0,
                "logs": logs,
                "timestamp": "2021-03-01T12:00:00Z"
            }
        }))
        .unwrap()
    }

    fn decode_one(message: Value, logs: Value) -> DecodeResult<Vec<Fact>> {
        let tx = tx_with(vec![message.clone()], logs);
        MessageDecoder::default().decode(0, &message, &tx)
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_send_produces_transfer() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.bank.v1beta1.MsgSend",
                "from_address": "cosmos1from",
                "to_address": "cosmos1to",
                "amount": [{ "denom": "uatom", "amount": "2500000" }]
            }),
            json!([]),
        )
        .unwrap();

        let [Fact::Transfer(t)] = facts.as_slice() else {
            panic!("expected one transfer, got {facts:?}");
        };
        assert_eq!(t.amount, dec("2.5"));
        assert_eq!(t.currency, "uatom");
        assert_eq!(t.id, derived_id(format!("{HASH}.0")));
    }

    #[test]
    fn test_send_with_mixed_denoms_fails() {
        let err = decode_one(
            json!({
                "@type": "/cosmos.bank.v1beta1.MsgSend",
                "from_address": "a",
                "to_address": "b",
                "amount": [{ "denom": "uatom", "amount": "1" }, { "denom": "ibc/X", "amount": "1" }]
            }),
            json!([]),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::MixedDenoms { .. }));
    }

    #[test]
    fn test_multi_send_legs() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.bank.v1beta1.MsgMultiSend",
                "inputs": [{ "address": "cosmos1in", "coins": [{ "denom": "uatom", "amount": "3000000" }] }],
                "outputs": [
                    { "address": "cosmos1a", "coins": [{ "denom": "uatom", "amount": "1000000" }] },
                    { "address": "cosmos1b", "coins": [{ "denom": "uatom", "amount": "2000000" }] }
                ]
            }),
            json!([]),
        )
        .unwrap();

        assert_eq!(facts.len(), 3);
        let Fact::Transfer(input) = &facts[0] else { panic!() };
        assert_eq!(input.from, "cosmos1in");
        assert_eq!(input.to, "");
        assert_eq!(input.id, derived_id(format!("{HASH}.0.i.0")));
        let Fact::Transfer(second) = &facts[2] else { panic!() };
        assert_eq!(second.from, "");
        assert_eq!(second.to, "cosmos1b");
        assert_eq!(second.id, derived_id(format!("{HASH}.0.o.1")));
    }

    // Test critique: montant signé pour undelegate
    #[test]
    fn test_undelegate_is_negative() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.staking.v1beta1.MsgUndelegate",
                "delegator_address": "cosmos1d",
                "validator_address": "cosmosvaloper1v",
                "amount": { "denom": "uatom", "amount": "1000000" }
            }),
            json!([]),
        )
        .unwrap();
        let [Fact::Delegation(d)] = facts.as_slice() else { panic!() };
        assert_eq!(d.amount, dec("-1"));
    }

    #[test]
    fn test_redelegate_produces_two_rows() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.staking.v1beta1.MsgBeginRedelegate",
                "delegator_address": "cosmos1d",
                "validator_src_address": "cosmosvaloper1src",
                "validator_dst_address": "cosmosvaloper1dst",
                "amount": { "denom": "uatom", "amount": "5000000" }
            }),
            json!([]),
        )
        .unwrap();

        let [Fact::Delegation(src), Fact::Delegation(dst)] = facts.as_slice() else {
            panic!("expected two delegations");
        };
        assert_eq!(src.validator, "cosmosvaloper1src");
        assert_eq!(src.amount, dec("-5"));
        assert_eq!(dst.validator, "cosmosvaloper1dst");
        assert_eq!(dst.amount, dec("5"));
        assert_ne!(src.id, dst.id);
        assert_eq!(src.id, derived_id(format!("{HASH}.0.s")));
    }

    #[test]
    fn test_delegator_reward_matched_by_validator() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward",
                "delegator_address": "cosmos1d",
                "validator_address": "cosmosvaloper1b"
            }),
            json!([{ "events": [{
                "type": "withdraw_rewards",
                "attributes": [
                    { "key": "amount", "value": "1000000uatom" },
                    { "key": "validator", "value": "cosmosvaloper1a" },
                    { "key": "amount", "value": "2500000uatom" },
                    { "key": "validator", "value": "cosmosvaloper1b" }
                ]
            }]}]),
        )
        .unwrap();
        let [Fact::DelegatorReward(r)] = facts.as_slice() else { panic!() };
        assert_eq!(r.amount, dec("2.5"));
    }

    #[test]
    fn test_delegator_reward_without_event_fails() {
        let err = decode_one(
            json!({
                "@type": "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward",
                "delegator_address": "cosmos1d",
                "validator_address": "cosmosvaloper1b"
            }),
            json!([]),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::MissingEvent(_)));
    }

    #[test]
    fn test_validator_commission_from_event() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission",
                "validator_address": "cosmosvaloper1v"
            }),
            json!([{ "events": [{
                "type": "withdraw_commission",
                "attributes": [{ "key": "amount", "value": "7000000uatom" }]
            }]}]),
        )
        .unwrap();
        let [Fact::ValidatorReward(r)] = facts.as_slice() else { panic!() };
        assert_eq!(r.amount, dec("7"));
        assert_eq!(r.address, "cosmosvaloper1v");
    }

    #[test]
    fn test_submit_proposal_requires_proposal_id() {
        let message = json!({
            "@type": "/cosmos.gov.v1beta1.MsgSubmitProposal",
            "content": {
                "@type": "/cosmos.distribution.v1beta1.CommunityPoolSpendProposal",
                "title": "Fund",
                "description": "Spend",
                "recipient": "cosmos1r",
                "amount": [{ "denom": "uatom", "amount": "10000000" }]
            },
            "initial_deposit": [{ "denom": "uatom", "amount": "512000000" }],
            "proposer": "cosmos1p"
        });

        let err = decode_one(message.clone(), json!([])).unwrap_err();
        assert!(matches!(err, DecodeError::MissingEvent(_)));

        let facts = decode_one(
            message,
            json!([{ "events": [{
                "type": "submit_proposal",
                "attributes": [{ "key": "proposal_id", "value": "37" }]
            }]}]),
        )
        .unwrap();
        let [Fact::Proposal(p)] = facts.as_slice() else { panic!() };
        assert_eq!(p.id, 37);
        assert_eq!(p.title, "Fund");
        assert_eq!(p.amount, dec("10"));
        assert_eq!(p.init_deposit, dec("512"));
    }

    #[test]
    fn test_vote_options() {
        let vote = |option: Value| {
            decode_one(
                json!({
                    "@type": "/cosmos.gov.v1beta1.MsgVote",
                    "proposal_id": "5",
                    "voter": "cosmos1v",
                    "option": option
                }),
                json!([]),
            )
        };

        let facts = vote(json!("VOTE_OPTION_NO_WITH_VETO")).unwrap();
        let [Fact::ProposalVote(v)] = facts.as_slice() else { panic!() };
        assert_eq!(v.option, VoteOption::NoWithVeto);
        assert_eq!(v.proposal_id, 5);

        let err = vote(json!("VOTE_OPTION_MAYBE")).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownVoteOption(_)));
    }

    #[test]
    fn test_deposit_and_unjail() {
        let facts = decode_one(
            json!({
                "@type": "/cosmos.gov.v1.MsgDeposit",
                "proposal_id": "12",
                "depositor": "cosmos1d",
                "amount": [{ "denom": "uatom", "amount": "1000000" }]
            }),
            json!([]),
        )
        .unwrap();
        let [Fact::ProposalDeposit(d)] = facts.as_slice() else { panic!() };
        assert_eq!(d.proposal_id, 12);
        assert_eq!(d.amount, dec("1"));

        let facts = decode_one(
            json!({ "@type": "/cosmos.slashing.v1beta1.MsgUnjail", "validator_addr": "cosmosvaloper1j" }),
            json!([]),
        )
        .unwrap();
        let [Fact::Jailer(j)] = facts.as_slice() else { panic!() };
        assert_eq!(j.address, "cosmosvaloper1j");
        assert_eq!(j.tx_hash, HASH);
    }

    #[test]
    fn test_unknown_message_is_ignored() {
        let facts = decode_one(
            json!({ "@type": "/ibc.core.client.v1.MsgUpdateClient", "signer": "cosmos1x" }),
            json!([]),
        )
        .unwrap();
        assert!(facts.is_empty());
    }

    // Test critique: idempotence des ids dérivés
    #[test]
    fn test_decoding_twice_yields_identical_ids() {
        let message = json!({
            "@type": "/cosmos.staking.v1beta1.MsgDelegate",
            "delegator_address": "cosmos1d",
            "validator_address": "cosmosvaloper1v",
            "amount": { "denom": "uatom", "amount": "1" }
        });
        let first = decode_one(message.clone(), json!([])).unwrap();
        let second = decode_one(message, json!([])).unwrap();
        assert_eq!(first, second);
    }
}
