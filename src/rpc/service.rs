//! WalletRpc - the command surface.
//!
//! One entry point, `handle`, takes a command name and a JSON params object
//! and always produces a JSON response; errors never escape as transport
//! failures. Spend-style commands report `status`/`reason`, everything else
//! `success`/`error`, with the offer commands keeping their historical
//! `reason` field.

use crate::error::{Result, WalletError};
use crate::keys::generate_mnemonic;
use crate::lifecycle::LifecycleManager;
use crate::rpc::events::EventHub;
use crate::wallet::backend::SpendRequest;
use crate::wallet::confirm::ConfirmationOutcome;
use crate::wallet::node::WalletNode;
use crate::wallet::registry::WalletId;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub struct WalletRpc {
    lifecycle: Arc<LifecycleManager>,
    events: EventHub,
}

impl WalletRpc {
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle, events: EventHub::new() }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    /// Run one command. Never fails at the transport level; errors come back
    /// as normalized failure records.
    pub async fn handle(&self, command: &str, params: Value) -> Value {
        match self.dispatch(command, &params).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(command, error = %e, "command failed");
                match command {
                    "send_transaction" | "cc_spend" => e.to_status_response(),
                    "create_offer_for_ids" | "respond_to_offer" => {
                        json!({ "success": false, "reason": e.to_string() })
                    }
                    _ => e.to_response(),
                }
            }
        }
    }

    async fn dispatch(&self, command: &str, params: &Value) -> Result<Value> {
        match command {
            // key management - available while logged out
            "log_in" => self.log_in(params).await,
            "add_key" => self.add_key(params).await,
            "delete_key" => self.delete_key(params).await,
            "delete_all_keys" => self.delete_all_keys().await,
            "generate_mnemonic" => self.generate_mnemonic(),
            "get_public_keys" => self.get_public_keys(),
            "get_private_key" => self.get_private_key(params),

            // wallet operations - need an active subsystem
            "get_wallets" => self.get_wallets().await,
            "get_wallet_summaries" => self.get_wallet_summaries().await,
            "create_new_wallet" => self.create_new_wallet(params).await,
            "get_wallet_balance" => self.get_wallet_balance(params).await,
            "get_next_puzzle_hash" => self.get_next_puzzle_hash(params).await,
            "get_transactions" => self.get_transactions(params).await,
            "send_transaction" => self.send_transaction(params).await,
            "cc_spend" => self.cc_spend(params).await,
            "cc_set_name" => self.cc_set_name(params).await,
            "cc_get_name" => self.cc_get_name(params).await,
            "cc_get_colour" => self.cc_get_colour(params).await,
            "rl_set_admin_info" => self.rl_set_admin_info(params).await,
            "rl_set_user_info" => self.rl_set_user_info(params).await,

            // trade offers
            "create_offer_for_ids" => self.create_offer_for_ids(params).await,
            "get_discrepancies_for_offer" => self.get_discrepancies_for_offer(params).await,
            "respond_to_offer" => self.respond_to_offer(params).await,

            // node queries
            "farm_block" => self.farm_block(params).await,
            "get_sync_status" => self.get_sync_status().await,
            "get_height_info" => self.get_height_info().await,
            "get_connection_info" => self.get_connection_info().await,

            other => Err(WalletError::UnknownCommand(other.to_string())),
        }
    }

    async fn node(&self) -> Result<Arc<WalletNode>> {
        self.lifecycle.active().await
    }

    // -- key management --

    async fn log_in(&self, params: &Value) -> Result<Value> {
        let fingerprint = u32_param(params, "fingerprint")?;
        let started = self.lifecycle.log_in(fingerprint).await?;
        if started {
            self.events.state_changed("logged_in", None);
        }
        Ok(json!({ "success": started }))
    }

    /// Accepts either a `mnemonic` (24 words) or a `hexkey` (64 or 154 hex
    /// characters). Logs in with the new key when it is accepted.
    async fn add_key(&self, params: &Value) -> Result<Value> {
        let started = if let Some(words) = params.get("mnemonic").and_then(Value::as_str) {
            self.lifecycle.add_key_mnemonic(words).await?
        } else if let Some(hexkey) = params.get("hexkey").and_then(Value::as_str) {
            self.lifecycle.add_key_hex(hexkey).await?
        } else {
            return Err(WalletError::InvalidRequest("mnemonic or hexkey required".into()));
        };
        if started {
            self.events.state_changed("logged_in", None);
        }
        Ok(json!({ "success": started }))
    }

    async fn delete_key(&self, params: &Value) -> Result<Value> {
        let fingerprint = u32_param(params, "fingerprint")?;
        self.lifecycle.delete_key(fingerprint).await?;
        Ok(json!({ "success": true }))
    }

    async fn delete_all_keys(&self) -> Result<Value> {
        self.lifecycle.delete_all_keys().await?;
        Ok(json!({ "success": true }))
    }

    fn generate_mnemonic(&self) -> Result<Value> {
        Ok(json!({ "success": true, "mnemonic": generate_mnemonic() }))
    }

    fn get_public_keys(&self) -> Result<Value> {
        let fingerprints = self.lifecycle.fingerprints()?;
        Ok(json!({ "success": true, "public_key_fingerprints": fingerprints }))
    }

    fn get_private_key(&self, params: &Value) -> Result<Value> {
        let fingerprint = u32_param(params, "fingerprint")?;
        match self.lifecycle.find_key(fingerprint)? {
            // `seed` is null for keys that were added from raw hex.
            Some((key, mnemonic)) => Ok(json!({
                "success": true,
                "private_key": {
                    "fingerprint": fingerprint,
                    "esk": key.to_hex(),
                    "seed": mnemonic,
                },
            })),
            None => Ok(json!({
                "success": false,
                "private_key": { "fingerprint": fingerprint },
            })),
        }
    }

    // -- wallet operations --

    async fn get_wallets(&self) -> Result<Value> {
        let node = self.node().await?;
        let wallets: Vec<Value> = node
            .dispatcher
            .summaries()
            .await?
            .into_iter()
            .map(|s| {
                let mut entry = json!({ "id": s.id, "type": s.kind.as_str() });
                if let Some(name) = s.name {
                    entry["name"] = json!(name);
                }
                if let Some(colour) = s.colour {
                    entry["colour"] = json!(colour);
                }
                entry
            })
            .collect();
        Ok(json!({ "wallets": wallets, "success": true }))
    }

    async fn get_wallet_summaries(&self) -> Result<Value> {
        let node = self.node().await?;
        let mut summaries = Map::new();
        for s in node.dispatcher.summaries().await? {
            let mut entry = json!({ "type": s.kind.as_str(), "balance": s.balance });
            if let Some(name) = s.name {
                entry["name"] = json!(name);
            }
            if let Some(colour) = s.colour {
                entry["colour"] = json!(colour);
            }
            summaries.insert(s.id.to_string(), entry);
        }
        Ok(json!({ "success": true, "wallet_summaries": summaries }))
    }

    async fn create_new_wallet(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_type = str_param(params, "wallet_type")?;
        let id = match wallet_type {
            "cc_wallet" => match str_param(params, "mode")? {
                "new" => node.dispatcher.create_coloured_new(u64_param(params, "amount")?).await?,
                "existing" => {
                    node.dispatcher.create_coloured_existing(str_param(params, "colour")?).await?
                }
                other => {
                    return Err(WalletError::InvalidRequest(format!("unknown mode {other}")))
                }
            },
            "rl_wallet" => node.dispatcher.create_rate_limited().await?,
            other => {
                return Err(WalletError::InvalidRequest(format!("unknown wallet_type {other}")))
            }
        };
        let kind = node.dispatcher.kind_of(id).await?;
        self.events.state_changed("wallet_created", Some(id));
        Ok(json!({ "success": true, "type": kind.as_str() }))
    }

    async fn get_wallet_balance(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let (balances, frozen) = node.dispatcher.balances(wallet_id).await?;
        Ok(json!({
            "wallet_id": wallet_id,
            "success": true,
            "confirmed_wallet_balance": balances.confirmed,
            "unconfirmed_wallet_balance": balances.unconfirmed,
            "spendable_balance": balances.spendable,
            "frozen_balance": frozen,
            "pending_change": balances.pending_change,
        }))
    }

    async fn get_next_puzzle_hash(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let puzzle_hash = node.dispatcher.new_receive_address(wallet_id).await?;
        Ok(json!({ "wallet_id": wallet_id, "puzzle_hash": puzzle_hash }))
    }

    async fn get_transactions(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let txs = node.dispatcher.transactions(wallet_id).await?;
        Ok(json!({ "success": true, "txs": txs, "wallet_id": wallet_id }))
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let request = SpendRequest {
            amount: u64_param(params, "amount")?,
            puzzle_hash: str_param(params, "puzzle_hash")?.to_string(),
            fee: params.get("fee").and_then(Value::as_u64).unwrap_or(0),
        };
        let outcome = node.dispatcher.spend(wallet_id, request).await?;
        if outcome == ConfirmationOutcome::Success {
            self.events.state_changed("tx_sent", Some(wallet_id));
        }
        Ok(outcome.to_response())
    }

    async fn cc_spend(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let amount = u64_param(params, "amount")?;
        let innerpuzhash = str_param(params, "innerpuzhash")?;
        let outcome = node.dispatcher.coloured_spend(wallet_id, amount, innerpuzhash).await?;
        if outcome == ConfirmationOutcome::Success {
            self.events.state_changed("tx_sent", Some(wallet_id));
        }
        Ok(outcome.to_response())
    }

    async fn cc_set_name(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        node.dispatcher.set_colour_name(wallet_id, str_param(params, "name")?).await?;
        Ok(json!({ "wallet_id": wallet_id, "success": true }))
    }

    async fn cc_get_name(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let name = node.dispatcher.colour_name(wallet_id).await?;
        Ok(json!({ "wallet_id": wallet_id, "name": name }))
    }

    async fn cc_get_colour(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let colour = node.dispatcher.colour(wallet_id).await?;
        Ok(json!({ "colour": colour, "wallet_id": wallet_id }))
    }

    async fn rl_set_admin_info(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let accepted = node
            .dispatcher
            .configure_rl_admin(
                wallet_id,
                u64_param(params, "interval")?,
                u64_param(params, "limit")?,
                str_param(params, "user_pubkey")?,
                u64_param(params, "amount")?,
            )
            .await?;
        Ok(json!({ "success": accepted }))
    }

    async fn rl_set_user_info(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let wallet_id = wallet_id_param(params)?;
        let accepted = node
            .dispatcher
            .configure_rl_user(
                wallet_id,
                u64_param(params, "interval")?,
                u64_param(params, "limit")?,
                str_param(params, "origin_id")?,
                str_param(params, "admin_pubkey")?,
            )
            .await?;
        Ok(json!({ "success": accepted }))
    }

    // -- trade offers --

    async fn create_offer_for_ids(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let ids = ids_param(params)?;
        let filename = str_param(params, "filename")?;
        node.trade.create_offer_for_ids(&ids, Path::new(filename)).await?;
        Ok(json!({ "success": true }))
    }

    async fn get_discrepancies_for_offer(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let filename = str_param(params, "filename")?;
        let discrepancies = node.trade.get_discrepancies(Path::new(filename)).await?;
        Ok(json!({ "success": true, "discrepancies": discrepancies }))
    }

    async fn respond_to_offer(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let filename = str_param(params, "filename")?;
        node.trade.respond_to_offer(Path::new(filename)).await?;
        self.events.state_changed("offer_accepted", None);
        Ok(json!({ "success": true }))
    }

    // -- node queries --

    async fn farm_block(&self, params: &Value) -> Result<Value> {
        let node = self.node().await?;
        let puzzle_hash = str_param(params, "puzzle_hash")?;
        node.backend()
            .farm_block(puzzle_hash)
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))?;
        self.events.state_changed("new_block", None);
        Ok(json!({ "success": true }))
    }

    async fn get_sync_status(&self) -> Result<Value> {
        let node = self.node().await?;
        let syncing =
            node.backend().sync_status().await.map_err(|e| WalletError::Backend(e.to_string()))?;
        Ok(json!({ "syncing": syncing }))
    }

    async fn get_height_info(&self) -> Result<Value> {
        let node = self.node().await?;
        let height =
            node.backend().height().await.map_err(|e| WalletError::Backend(e.to_string()))?;
        Ok(json!({ "height": height }))
    }

    async fn get_connection_info(&self) -> Result<Value> {
        let node = self.node().await?;
        let peers =
            node.backend().peers().await.map_err(|e| WalletError::Backend(e.to_string()))?;
        Ok(json!({ "connections": peers }))
    }
}

// -- param extraction --

fn require<'a>(params: &'a Value, key: &str) -> Result<&'a Value> {
    params.get(key).ok_or_else(|| WalletError::InvalidRequest(format!("missing {key}")))
}

/// Numbers arrive either as JSON numbers or as numeric strings; accept both.
fn u64_param(params: &Value, key: &str) -> Result<u64> {
    let value = require(params, key)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| WalletError::InvalidRequest(format!("{key} must be a non-negative integer")))
}

fn u32_param(params: &Value, key: &str) -> Result<u32> {
    u64_param(params, key)?
        .try_into()
        .map_err(|_| WalletError::InvalidRequest(format!("{key} out of range")))
}

fn wallet_id_param(params: &Value) -> Result<WalletId> {
    u32_param(params, "wallet_id")
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    require(params, key)?
        .as_str()
        .ok_or_else(|| WalletError::InvalidRequest(format!("{key} must be a string")))
}

/// The `ids` object maps wallet-id strings to signed amounts.
fn ids_param(params: &Value) -> Result<BTreeMap<WalletId, i64>> {
    let object = require(params, "ids")?
        .as_object()
        .ok_or_else(|| WalletError::InvalidRequest("ids must be an object".into()))?;
    let mut ids = BTreeMap::new();
    for (key, value) in object {
        let id: WalletId = key
            .parse()
            .map_err(|_| WalletError::InvalidRequest(format!("bad wallet id {key}")))?;
        let amount = value
            .as_i64()
            .ok_or_else(|| WalletError::InvalidRequest(format!("bad amount for wallet {key}")))?;
        ids.insert(id, amount);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::simulator::SimNodeFactory;
    use tempfile::TempDir;

    fn rpc(dir: &TempDir) -> WalletRpc {
        let config = ServiceConfig::new("testapp").with_data_dir(dir.path());
        let lifecycle =
            LifecycleManager::new(config, Arc::new(SimNodeFactory::new(0))).expect("lifecycle");
        WalletRpc::new(Arc::new(lifecycle))
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let dir = TempDir::new().unwrap();
        let response = rpc(&dir).handle("frobnicate", json!({})).await;
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().contains("unknown command"));
    }

    #[tokio::test]
    async fn test_generate_mnemonic_is_24_words() {
        let dir = TempDir::new().unwrap();
        let response = rpc(&dir).handle("generate_mnemonic", json!({})).await;
        assert_eq!(response["success"], true);
        let words = response["mnemonic"].as_str().unwrap();
        assert_eq!(words.split_whitespace().count(), 24);
    }

    #[tokio::test]
    async fn test_log_in_unknown_fingerprint_fails_softly() {
        let dir = TempDir::new().unwrap();
        let response = rpc(&dir).handle("log_in", json!({ "fingerprint": 12345 })).await;
        assert_eq!(response["success"], false);
    }

    #[tokio::test]
    async fn test_wallet_command_without_login_is_no_active_wallet() {
        let dir = TempDir::new().unwrap();
        let response = rpc(&dir).handle("get_wallets", json!({})).await;
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().contains("log in"));
    }

    #[tokio::test]
    async fn test_spend_without_login_reports_status_failed() {
        let dir = TempDir::new().unwrap();
        let response = rpc(&dir)
            .handle(
                "send_transaction",
                json!({ "wallet_id": 1, "amount": 10, "puzzle_hash": "00" }),
            )
            .await;
        assert_eq!(response["status"], "FAILED");
        assert!(response["reason"].as_str().unwrap().contains("log in"));
    }

    #[tokio::test]
    async fn test_numeric_string_params_accepted() {
        let dir = TempDir::new().unwrap();
        let rpc = rpc(&dir);
        let added = rpc.handle("add_key", json!({ "hexkey": "ab".repeat(32) })).await;
        assert_eq!(added["success"], true);

        let response = rpc.handle("get_wallet_balance", json!({ "wallet_id": "1" })).await;
        assert_eq!(response["success"], true);
        assert_eq!(response["wallet_id"], 1);
        assert_eq!(response["confirmed_wallet_balance"], 0);
        assert_eq!(response["frozen_balance"], 0);
    }

    #[tokio::test]
    async fn test_add_key_requires_key_material() {
        let dir = TempDir::new().unwrap();
        let response = rpc(&dir).handle("add_key", json!({})).await;
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().contains("mnemonic or hexkey"));
    }
}
