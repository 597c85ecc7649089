//! Identity lifecycle: teardown ordering, key envelopes, keychain wipes.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use walletd::simulator::SimNodeFactory;
use walletd::{LifecycleManager, ServiceConfig, WalletError};

fn manager(dir: &TempDir) -> (Arc<LifecycleManager>, Arc<SimNodeFactory>) {
    let config = ServiceConfig::new("walletd-test")
        .with_data_dir(dir.path())
        .with_poll_interval(Duration::from_millis(5))
        .with_confirm_deadline(Duration::from_secs(2));
    let factory = Arc::new(SimNodeFactory::new(0));
    let lifecycle = LifecycleManager::new(config, factory.clone()).expect("lifecycle manager");
    (Arc::new(lifecycle), factory)
}

#[tokio::test]
async fn test_relogin_closes_previous_subsystem() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, factory) = manager(&dir);

    assert!(lifecycle.add_key_hex(&"22".repeat(32)).await.unwrap());
    let first = lifecycle.active().await.unwrap().fingerprint;

    assert!(lifecycle.add_key_hex(&"33".repeat(32)).await.unwrap());
    let second = lifecycle.active().await.unwrap().fingerprint;
    assert_ne!(first, second);

    // Exactly one subsystem is live; the first one's stores are closed.
    let backends = factory.backends();
    assert_eq!(backends.len(), 2);
    assert!(backends[0].is_closed());
    assert!(!backends[1].is_closed());

    // Logging back in with the first key closes the second.
    assert!(lifecycle.log_in(first).await.unwrap());
    assert!(factory.backends()[1].is_closed());
    assert_eq!(lifecycle.active().await.unwrap().fingerprint, first);
}

#[tokio::test]
async fn test_login_with_unknown_key_leaves_logged_out() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);

    assert!(!lifecycle.log_in(987654).await.unwrap());
    assert!(!lifecycle.is_logged_in().await);
    assert!(matches!(lifecycle.active().await, Err(WalletError::NoActiveWallet)));
}

#[tokio::test]
async fn test_unknown_key_login_tears_down_current() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, factory) = manager(&dir);

    assert!(lifecycle.add_key_hex(&"44".repeat(32)).await.unwrap());
    // Teardown happens before the fingerprint check, so a bad login logs out.
    assert!(!lifecycle.log_in(111).await.unwrap());
    assert!(!lifecycle.is_logged_in().await);
    assert!(factory.backends()[0].is_closed());
}

#[tokio::test]
async fn test_bare_hex_key_lands_in_envelope_tail() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);

    let hexkey = "55".repeat(32);
    assert!(lifecycle.add_key_hex(&hexkey).await.unwrap());

    let fingerprints = lifecycle.fingerprints().unwrap();
    assert_eq!(fingerprints.len(), 1);
    let (fp, has_seed) = fingerprints[0];
    assert!(!has_seed);

    // The stored extended encoding is 77 bytes whose trailing 32 bytes are
    // the raw key exactly as supplied.
    let (key, mnemonic) = lifecycle.find_key(fp).unwrap().unwrap();
    let encoded = key.to_hex();
    assert_eq!(encoded.len(), 154);
    assert!(encoded.ends_with(&hexkey));
    assert!(mnemonic.is_none());
}

#[tokio::test]
async fn test_malformed_hex_rejected_before_keychain() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);

    for bad in ["abcd", &"66".repeat(40), "zz".repeat(32).as_str(), ""] {
        let err = lifecycle.add_key_hex(bad).await.unwrap_err();
        assert!(matches!(err, WalletError::KeyFormat(_)), "{bad}");
    }
    assert!(lifecycle.fingerprints().unwrap().is_empty());
    assert!(!lifecycle.is_logged_in().await);
}

#[tokio::test]
async fn test_mnemonic_key_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);

    let words = walletd::keys::generate_mnemonic();
    assert!(lifecycle.add_key_mnemonic(&words).await.unwrap());
    let fp = lifecycle.active().await.unwrap().fingerprint;

    // Re-adding the same mnemonic replaces the entry, same fingerprint.
    assert!(lifecycle.add_key_mnemonic(&words).await.unwrap());
    assert_eq!(lifecycle.active().await.unwrap().fingerprint, fp);
    assert_eq!(lifecycle.fingerprints().unwrap(), vec![(fp, true)]);
}

#[tokio::test]
async fn test_delete_key_logs_out() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, factory) = manager(&dir);

    assert!(lifecycle.add_key_hex(&"77".repeat(32)).await.unwrap());
    let fp = lifecycle.active().await.unwrap().fingerprint;

    lifecycle.delete_key(fp).await.unwrap();
    assert!(!lifecycle.is_logged_in().await);
    assert!(factory.backends()[0].is_closed());
    assert!(lifecycle.fingerprints().unwrap().is_empty());

    // The deleted key can no longer log in.
    assert!(!lifecycle.log_in(fp).await.unwrap());
}

#[tokio::test]
async fn test_delete_all_keys_wipes_keychain_and_database() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);

    assert!(lifecycle.add_key_hex(&"88".repeat(32)).await.unwrap());
    assert!(lifecycle.add_key_hex(&"99".repeat(32)).await.unwrap());

    let db = dir.path().join("wallet.db");
    std::fs::write(&db, b"wallet state").unwrap();

    lifecycle.delete_all_keys().await.unwrap();
    assert!(lifecycle.fingerprints().unwrap().is_empty());
    assert!(!lifecycle.is_logged_in().await);
    assert!(!db.exists());
}

#[tokio::test]
async fn test_keychain_persists_across_manager_restart() {
    let dir = TempDir::new().unwrap();
    let fp = {
        let (lifecycle, _) = manager(&dir);
        assert!(lifecycle.add_key_hex(&"aa".repeat(32)).await.unwrap());
        lifecycle.active().await.unwrap().fingerprint
    };

    // A fresh manager over the same data dir sees the key and can log in.
    let (lifecycle, _) = manager(&dir);
    assert!(!lifecycle.is_logged_in().await);
    assert_eq!(lifecycle.fingerprints().unwrap(), vec![(fp, false)]);
    assert!(lifecycle.log_in(fp).await.unwrap());
    assert_eq!(lifecycle.active().await.unwrap().fingerprint, fp);
}

#[tokio::test]
async fn test_concurrent_handlers_fail_fast_during_teardown() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);
    assert!(lifecycle.add_key_hex(&"bb".repeat(32)).await.unwrap());

    lifecycle.log_out().await;
    // After the slot is emptied every handler observes the logged-out state.
    assert!(matches!(lifecycle.active().await, Err(WalletError::NoActiveWallet)));
}

#[tokio::test]
async fn test_rpc_add_key_hex_reflects_in_private_key() {
    let dir = TempDir::new().unwrap();
    let (lifecycle, _) = manager(&dir);
    let rpc = walletd::WalletRpc::new(lifecycle);

    let hexkey = "cc".repeat(32);
    let added = rpc.handle("add_key", json!({ "hexkey": hexkey })).await;
    assert_eq!(added["success"], true);

    let keys = rpc.handle("get_public_keys", json!({})).await;
    let fp = keys["public_key_fingerprints"][0][0].as_u64().unwrap();

    let response = rpc.handle("get_private_key", json!({ "fingerprint": fp })).await;
    assert_eq!(response["success"], true);
    let esk = response["private_key"]["esk"].as_str().unwrap();
    assert!(esk.ends_with(&hexkey));
    // No mnemonic is known for a raw hex key; the seed is null, not "".
    assert!(response["private_key"]["seed"].is_null());
}
