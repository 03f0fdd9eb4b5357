//! Accounts injected by a browser extension that holds the private keys.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Source string reported by the first-party extension.
pub const FIRST_PARTY_SOURCE: &str = "polkadot-js";

/// Label shown for accounts coming from the first-party extension.
pub const FIRST_PARTY_LABEL: &str = "extension";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedMeta {
    pub name: String,
    pub source: String,
}

/// An account record as the extension reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedAccount {
    pub address: String,
    pub meta: InjectedMeta,
}

/// An injected account with a display name that states where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub address: String,
    pub display_name: String,
    pub source: String,
}

impl From<InjectedAccount> for AccountRef {
    fn from(account: InjectedAccount) -> Self {
        let label = if account.meta.source == FIRST_PARTY_SOURCE {
            FIRST_PARTY_LABEL
        } else {
            account.meta.source.as_str()
        };
        let display_name = format!("{} ({})", account.meta.name, label);
        Self {
            address: account.address,
            display_name,
            source: account.meta.source,
        }
    }
}

#[async_trait]
pub trait Extension: Send + Sync {
    /// Whether an extension is present at all.
    fn is_injected(&self) -> bool;

    /// Ask the extension to authorize `app_name`.
    async fn enable(&self, app_name: &str) -> Result<(), ApiError>;

    async fn accounts(&self) -> Result<Vec<InjectedAccount>, ApiError>;
}

/// Used when no extension is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoExtension;

#[async_trait]
impl Extension for NoExtension {
    fn is_injected(&self) -> bool {
        false
    }

    async fn enable(&self, _app_name: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<InjectedAccount>, ApiError> {
        Ok(Vec::new())
    }
}

/// An extension backed by a fixed account list, e.g. exported to JSON.
#[derive(Clone, Debug, Default)]
pub struct StaticExtension {
    accounts: Vec<InjectedAccount>,
}

impl StaticExtension {
    pub fn new(accounts: Vec<InjectedAccount>) -> Self {
        Self { accounts }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let accounts: Vec<InjectedAccount> = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Extension(format!("invalid account list: {e}")))?;
        Ok(Self::new(accounts))
    }
}

#[async_trait]
impl Extension for StaticExtension {
    fn is_injected(&self) -> bool {
        true
    }

    async fn enable(&self, _app_name: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<InjectedAccount>, ApiError> {
        Ok(self.accounts.clone())
    }
}
