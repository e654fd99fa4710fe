//! Engine configuration.
//!
//! The engine is a library and reads no environment itself; the embedding
//! binary (see the server crate) builds these structs from whatever
//! configuration source it owns.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Default bound on a single remote call. Propagation is background work,
/// but an unbounded hang would pin its item in `Pending` indefinitely.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the whole engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Remote cart service settings.
    pub remote: RemoteConfig,
    /// Path of the durable cache slot (a single JSON file).
    pub cache_path: PathBuf,
}

/// Configuration for the remote cart service client.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote cart service, e.g. `http://localhost:3000`.
    pub base_url: Url,
    /// Per-request timeout. A timed-out call is just another failure
    /// outcome; the engine degrades the item and moves on.
    pub timeout: Duration,
    /// Optional bearer token sent with every request.
    pub bearer_token: Option<SecretString>,
}

impl RemoteConfig {
    /// Create a config for `base_url` with the default timeout and no
    /// authentication.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_REMOTE_TIMEOUT,
            bearer_token: None,
        }
    }
}
