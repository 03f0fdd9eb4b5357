use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::catalog::TxHandle;
use crate::chain::ChainApi;
use crate::extension::AccountRef;

/// Published in place of a chain name that is not known yet.
pub const UNKNOWN_CHAIN: &str = "<unknown>";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Ready,
}

/// Connection state owned by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub is_api_connected: bool,
    pub is_api_ready: bool,
    pub chain: Option<String>,
    pub is_development: bool,
    pub is_substrate_v2: bool,
    pub default_tx: Option<TxHandle>,
    pub default_tx_sudo: Option<TxHandle>,
    pub injected_accounts: Vec<AccountRef>,
    pub is_waiting_injected: bool,
    /// Bumped on every disconnect; a readiness run started under an older
    /// generation may not commit.
    pub generation: u64,
}

impl ConnectionState {
    pub fn new(is_waiting_injected: bool) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            is_api_connected: false,
            is_api_ready: false,
            chain: None,
            is_development: false,
            is_substrate_v2: true,
            default_tx: None,
            default_tx_sudo: None,
            injected_accounts: Vec::new(),
            is_waiting_injected,
            generation: 0,
        }
    }

    /// Ready only once the chain identity is known as well.
    pub fn published_ready(&self) -> bool {
        self.is_api_ready && self.chain.is_some()
    }

    pub fn current_chain(&self) -> &str {
        self.chain.as_deref().unwrap_or(UNKNOWN_CHAIN)
    }

    pub fn context(&self, api: Arc<dyn ChainApi>) -> ApiContext {
        ApiContext {
            api,
            default_tx: self.default_tx.clone(),
            default_tx_sudo: self.default_tx_sudo.clone(),
            current_chain: self.current_chain().to_string(),
            is_api_connected: self.is_api_connected,
            is_api_ready: self.published_ready(),
            is_development: self.is_development,
            is_substrate_v2: self.is_substrate_v2,
            is_waiting_injected: self.is_waiting_injected,
        }
    }
}

/// What the rest of the UI sees of the connection.
#[derive(Clone)]
pub struct ApiContext {
    pub api: Arc<dyn ChainApi>,
    pub default_tx: Option<TxHandle>,
    pub default_tx_sudo: Option<TxHandle>,
    pub current_chain: String,
    pub is_api_connected: bool,
    pub is_api_ready: bool,
    pub is_development: bool,
    pub is_substrate_v2: bool,
    pub is_waiting_injected: bool,
}

impl ApiContext {
    /// Switching endpoints at runtime is disabled; the request is only logged.
    pub fn set_api_url(&self, url: &str) {
        warn!(url, "api change ignored");
    }
}

impl fmt::Debug for ApiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiContext")
            .field("default_tx", &self.default_tx)
            .field("default_tx_sudo", &self.default_tx_sudo)
            .field("current_chain", &self.current_chain)
            .field("is_api_connected", &self.is_api_connected)
            .field("is_api_ready", &self.is_api_ready)
            .field("is_development", &self.is_development)
            .field("is_substrate_v2", &self.is_substrate_v2)
            .field("is_waiting_injected", &self.is_waiting_injected)
            .finish_non_exhaustive()
    }
}
