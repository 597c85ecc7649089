//! Service configuration - passed from higher layers

use std::path::PathBuf;
use std::time::Duration;

/// Wallet service configuration. Builder-style; everything has a default.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Application name, used for the data directory.
    pub app: String,
    /// Root data directory. Defaults to `$WALLETD_ROOT` or the platform
    /// local-data dir.
    pub data_dir: Option<PathBuf>,
    /// Listen port for the RPC server.
    pub port: u16,
    /// Filename of the wallet database under the data dir.
    pub database_filename: String,
    /// Interval between confirmation polls.
    pub poll_interval: Duration,
    /// Deadline for the confirmation wait.
    pub confirm_deadline: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            app: "walletd".into(),
            data_dir: None,
            port: 9256,
            database_filename: "wallet.db".into(),
            poll_interval: Duration::from_millis(100),
            confirm_deadline: Duration::from_secs(30),
        }
    }
}

impl ServiceConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into(), ..Default::default() }
    }
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.data_dir = Some(dir.into()); self }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_database_filename(mut self, name: impl Into<String>) -> Self { self.database_filename = name.into(); self }
    pub fn with_poll_interval(mut self, interval: Duration) -> Self { self.poll_interval = interval; self }
    pub fn with_confirm_deadline(mut self, deadline: Duration) -> Self { self.confirm_deadline = deadline; self }

    /// Resolved root data directory for this app.
    pub fn root(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        let base = std::env::var("WALLETD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
        base.join(&self.app)
    }

    /// Path of the JSON keychain file.
    pub fn keys_path(&self) -> PathBuf {
        self.root().join("keys.json")
    }

    /// Path of the wallet database file.
    pub fn database_path(&self) -> PathBuf {
        self.root().join(&self.database_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_data_dir() {
        let config = ServiceConfig::new("testapp").with_data_dir("/tmp/walletd-test");
        assert_eq!(config.keys_path(), PathBuf::from("/tmp/walletd-test/keys.json"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/walletd-test/wallet.db"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServiceConfig::new("testapp")
            .with_port(4000)
            .with_poll_interval(Duration::from_millis(10))
            .with_confirm_deadline(Duration::from_secs(2));
        assert_eq!(config.port, 4000);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.confirm_deadline, Duration::from_secs(2));
    }
}
