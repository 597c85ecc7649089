//! Keychain - file-backed private key storage.
//!
//! Keys live in a JSON file under the data dir. The mnemonic is stored next
//! to the extended key when the key came from one, so `get_private_key` can
//! return it; keys added from raw hex have no mnemonic.

mod extended;

pub use extended::{generate_mnemonic, seed_from_mnemonic, ExtendedKey, EXTENDED_KEY_LEN, SECRET_KEY_LEN};

use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyEntry {
    esk: String,
    mnemonic: Option<String>,
}

#[derive(Debug)]
pub struct Keychain {
    path: PathBuf,
    entries: Vec<KeyEntry>,
}

impl Keychain {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| WalletError::Keychain(format!("parse: {e}")))?
        } else {
            Vec::new()
        };
        Ok(Self { path, entries })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| WalletError::Keychain(format!("serialize: {e}")))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Add a key, replacing any existing entry with the same fingerprint.
    /// Returns the key's fingerprint.
    pub fn add_key(&mut self, key: &ExtendedKey, mnemonic: Option<&str>) -> Result<u32> {
        let fingerprint = key.fingerprint();
        let kept = self.entries_except(fingerprint)?;
        self.entries = kept;
        self.entries.push(KeyEntry { esk: key.to_hex(), mnemonic: mnemonic.map(str::to_string) });
        self.save()?;
        Ok(fingerprint)
    }

    /// All entries except the one with `fingerprint`. An entry whose stored
    /// hex no longer parses aborts the mutation instead of being dropped;
    /// key material is never discarded silently.
    fn entries_except(&self, fingerprint: u32) -> Result<Vec<KeyEntry>> {
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let stored = ExtendedKey::from_hex(&entry.esk)
                .map_err(|e| WalletError::Keychain(format!("stored key unreadable: {e}")))?;
            if stored.fingerprint() != fingerprint {
                kept.push(entry.clone());
            }
        }
        Ok(kept)
    }

    /// All stored keys with their mnemonics, oldest first.
    pub fn keys(&self) -> Result<Vec<(ExtendedKey, Option<String>)>> {
        self.entries
            .iter()
            .map(|entry| Ok((ExtendedKey::from_hex(&entry.esk)?, entry.mnemonic.clone())))
            .collect()
    }

    /// Fingerprints of all stored public keys, with whether a mnemonic is
    /// known for each.
    pub fn fingerprints(&self) -> Result<Vec<(u32, bool)>> {
        Ok(self
            .keys()?
            .into_iter()
            .map(|(key, mnemonic)| (key.fingerprint(), mnemonic.is_some()))
            .collect())
    }

    pub fn find(&self, fingerprint: u32) -> Result<Option<(ExtendedKey, Option<String>)>> {
        Ok(self.keys()?.into_iter().find(|(key, _)| key.fingerprint() == fingerprint))
    }

    pub fn contains(&self, fingerprint: u32) -> Result<bool> {
        Ok(self.find(fingerprint)?.is_some())
    }

    pub fn delete(&mut self, fingerprint: u32) -> Result<()> {
        self.entries = self.entries_except(fingerprint)?;
        self.save()
    }

    pub fn delete_all(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-read the on-disk file and verify every stored key still parses.
    /// Run after every mutation so a corrupt write surfaces immediately.
    pub fn reload(&mut self) -> Result<()> {
        let fresh = Self::load(self.path.clone())?;
        for entry in &fresh.entries {
            ExtendedKey::from_hex(&entry.esk)?;
        }
        self.entries = fresh.entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_keychain() -> (TempDir, Keychain) {
        let dir = TempDir::new().expect("tempdir");
        let keychain = Keychain::load(dir.path().join("keys.json")).expect("keychain");
        (dir, keychain)
    }

    #[test]
    fn test_add_find_delete() {
        let (_dir, mut keychain) = temp_keychain();
        let key = ExtendedKey::from_seed(&[3u8; 64]).unwrap();
        let fp = keychain.add_key(&key, Some("words words words")).unwrap();

        assert!(keychain.contains(fp).unwrap());
        let (found, mnemonic) = keychain.find(fp).unwrap().unwrap();
        assert_eq!(found.to_hex(), key.to_hex());
        assert_eq!(mnemonic.as_deref(), Some("words words words"));

        keychain.delete(fp).unwrap();
        assert!(!keychain.contains(fp).unwrap());
    }

    #[test]
    fn test_persists_across_reload() {
        let (dir, mut keychain) = temp_keychain();
        let key = ExtendedKey::from_seed(&[4u8; 64]).unwrap();
        let fp = keychain.add_key(&key, None).unwrap();

        let reopened = Keychain::load(dir.path().join("keys.json")).unwrap();
        assert!(reopened.contains(fp).unwrap());
        assert_eq!(reopened.fingerprints().unwrap(), vec![(fp, false)]);
    }

    #[test]
    fn test_same_fingerprint_replaces() {
        let (_dir, mut keychain) = temp_keychain();
        let key = ExtendedKey::from_seed(&[5u8; 64]).unwrap();
        keychain.add_key(&key, None).unwrap();
        keychain.add_key(&key, Some("later mnemonic")).unwrap();
        assert_eq!(keychain.keys().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_entry_blocks_mutation() {
        let (dir, mut keychain) = temp_keychain();
        let path = dir.path().join("keys.json");
        keychain.add_key(&ExtendedKey::from_seed(&[9u8; 64]).unwrap(), None).unwrap();

        // Corrupt the stored hex on disk, then reopen.
        let mut entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        entries[0]["esk"] = serde_json::json!("not hex at all");
        std::fs::write(&path, serde_json::to_string_pretty(&entries).unwrap()).unwrap();
        let mut keychain = Keychain::load(&path).unwrap();

        // Mutations surface the unreadable entry instead of dropping it.
        let fresh = ExtendedKey::from_seed(&[10u8; 64]).unwrap();
        let err = keychain.add_key(&fresh, None).unwrap_err();
        assert!(matches!(err, WalletError::Keychain(_)), "{err:?}");
        let err = keychain.delete(12345).unwrap_err();
        assert!(matches!(err, WalletError::Keychain(_)), "{err:?}");

        // The entry is still on disk, untouched.
        assert!(std::fs::read_to_string(&path).unwrap().contains("not hex at all"));
    }

    #[test]
    fn test_delete_all() {
        let (_dir, mut keychain) = temp_keychain();
        keychain.add_key(&ExtendedKey::from_seed(&[6u8; 64]).unwrap(), None).unwrap();
        keychain.add_key(&ExtendedKey::from_seed(&[7u8; 64]).unwrap(), None).unwrap();
        keychain.delete_all().unwrap();
        assert!(keychain.is_empty());
        assert!(keychain.fingerprints().unwrap().is_empty());
    }
}
