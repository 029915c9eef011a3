//! Configuration for the ledger client.

use crate::error::{ClientError, ClientResult};
use ledgerlink_protocol::{ProtocolError, SigningIdentity};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Number of recent block ids requested on every refresh.
pub const DEFAULT_LOOKBACK: usize = 10;

/// Default client node name.
pub const DEFAULT_NAME: &str = "LedgerClient";

/// Where the client's signing key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// Hex-encoded secret key.
    Hex(String),
    /// File containing a hex-encoded secret key.
    File(PathBuf),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Hex(_) => f.write_str("KeySource::Hex(<redacted>)"),
            KeySource::File(path) => f.debug_tuple("KeySource::File").field(path).finish(),
        }
    }
}

impl KeySource {
    /// Loads the signing identity.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key cannot be read or parsed.
    pub fn load(&self) -> ClientResult<SigningIdentity> {
        let (identity, what) = match self {
            KeySource::Hex(encoded) => (SigningIdentity::from_hex(encoded), "invalid signing key"),
            KeySource::File(path) => (SigningIdentity::from_file(path), "failed to load key file"),
        };
        identity.map_err(|e| match e {
            ProtocolError::KeyLoad(reason) => ClientError::configuration(format!("{what}: {reason}")),
            other => ClientError::from(other),
        })
    }
}

/// Commit confirmation polling defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Time to sleep between status checks.
    pub poll_interval: Duration,
    /// Number of retries after the first status check.
    pub max_polls: u32,
}

impl WaitConfig {
    /// Creates a wait configuration.
    pub fn new(poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            poll_interval,
            max_polls,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 12)
    }
}

/// Configuration for a ledger client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Validator base URL, without a trailing `/`.
    pub base_url: String,
    /// Explicit store name. Takes precedence over the family's store.
    pub store_name: Option<String>,
    /// Client node name.
    pub name: String,
    /// Signing key. Without one the client is read-only.
    pub signing_key: Option<KeySource>,
    /// Skip the local speculative check and speculative application.
    pub disable_client_validation: bool,
    /// Timeout for HEAD requests and the status query.
    pub head_timeout: Duration,
    /// Timeout for GET requests.
    pub get_timeout: Duration,
    /// Timeout for POST requests.
    pub post_timeout: Duration,
    /// Number of recent block ids requested per refresh.
    pub lookback: usize,
    /// Commit confirmation defaults.
    pub wait: WaitConfig,
}

impl ClientConfig {
    /// Creates a configuration for the validator at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            store_name: None,
            name: DEFAULT_NAME.to_string(),
            signing_key: None,
            disable_client_validation: false,
            head_timeout: Duration::from_secs(30),
            get_timeout: Duration::from_secs(10),
            post_timeout: Duration::from_secs(10),
            lookback: DEFAULT_LOOKBACK,
            wait: WaitConfig::default(),
        }
    }

    /// Sets the store name.
    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = Some(name.into());
        self
    }

    /// Sets the client node name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the signing key source.
    pub fn with_signing_key(mut self, key: KeySource) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Disables local speculative validation.
    pub fn with_client_validation_disabled(mut self) -> Self {
        self.disable_client_validation = true;
        self
    }

    /// Sets all three request timeouts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.head_timeout = timeout;
        self.get_timeout = timeout;
        self.post_timeout = timeout;
        self
    }

    /// Sets the block lookback window.
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Sets the commit confirmation defaults.
    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparseable base URL or a zero
    /// lookback window.
    pub fn validate(&self) -> ClientResult<()> {
        Url::parse(&self.base_url).map_err(|e| {
            ClientError::configuration(format!("invalid base url '{}': {e}", self.base_url))
        })?;
        if self.lookback == 0 {
            return Err(ClientError::configuration("lookback must be at least 1"));
        }
        Ok(())
    }

    /// Resolves the store scope: the explicit store name, else the one
    /// implied by the transaction family, with surrounding `/` stripped.
    pub fn resolve_store_name(&self, family_store: Option<&str>) -> Option<String> {
        self.store_name
            .as_deref()
            .or(family_store)
            .map(|name| name.trim_matches('/').to_string())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8800")
    }
}
