use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::catalog::RuntimeSurface;
use crate::error::ApiError;
use crate::signer::QueueSigner;

/// Lifecycle notifications emitted by a chain-API handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiEvent {
    Connected,
    Disconnected,
    Ready,
}

/// The chain surface the orchestrator needs.
#[async_trait]
pub trait ChainApi: Send + Sync {
    fn subscribe_events(&self) -> broadcast::Receiver<ApiEvent>;

    /// `system_properties`
    async fn system_properties(&self) -> Result<ChainProperties, ApiError>;

    /// `system_chain`; an empty name is reported as `None`.
    async fn system_chain(&self) -> Result<Option<String>, ApiError>;

    /// Genesis hash plus method and constants catalogs. `None` until the
    /// runtime metadata has been loaded.
    fn runtime(&self) -> Option<Arc<RuntimeSurface>>;

    fn signer(&self) -> &QueueSigner;
}

/// A value the node may report either as a scalar or as a per-token list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn first(&self) -> Option<&T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.first(),
        }
    }
}

/// Response of `system_properties`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProperties {
    #[serde(default)]
    pub ss58_format: Option<u16>,
    #[serde(default)]
    pub token_decimals: Option<OneOrMany<u32>>,
    #[serde(default)]
    pub token_symbol: Option<OneOrMany<String>>,
}

impl ChainProperties {
    /// Primary token symbol, or `""` when the chain does not declare one.
    pub fn token_symbol(&self) -> &str {
        self.token_symbol
            .as_ref()
            .and_then(OneOrMany::first)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Primary token decimals, or `0` when the chain does not declare them.
    pub fn token_decimals(&self) -> u32 {
        self.token_decimals
            .as_ref()
            .and_then(OneOrMany::first)
            .copied()
            .unwrap_or_default()
    }
}

/// True for chain names used by local development networks.
pub fn is_test_chain(chain: Option<&str>) -> bool {
    chain.is_some_and(|name| name.ends_with("Development") || name.ends_with("Local Testnet"))
}
