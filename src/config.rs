use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Core tuning knobs. Everything here has a sensible default; embedders
/// only need `CoreConfig::default()` unless they want to override via
/// `switchboard.toml` or `SWITCHBOARD_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Credential cache TTL in seconds (default: 3600)
    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_secs: u64,

    /// How long a conversation-creation attempt waits on the per-pair
    /// lock before it counts as contended, in milliseconds (default: 2000)
    #[serde(default = "default_create_lock_timeout")]
    pub create_lock_timeout_ms: u64,

    /// Bounded retries for a contended conversation-creation lock
    /// before surfacing ConcurrencyConflict (default: 3)
    #[serde(default = "default_create_lock_attempts")]
    pub create_lock_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            credential_ttl_secs: default_credential_ttl(),
            create_lock_timeout_ms: default_create_lock_timeout(),
            create_lock_attempts: default_create_lock_attempts(),
        }
    }
}

fn default_credential_ttl() -> u64 {
    3600
}

fn default_create_lock_timeout() -> u64 {
    2000
}

fn default_create_lock_attempts() -> u32 {
    3
}

impl CoreConfig {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SWITCHBOARD_*)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(CoreConfig::default()))
            .merge(Toml::file("switchboard.toml"))
            .merge(Env::prefixed("SWITCHBOARD_"))
            .extract()
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn create_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.create_lock_timeout_ms)
    }
}
