//! The work done once the chain reports it can serve queries.

use std::sync::Arc;

use tracing::info;

use crate::catalog::{MethodCatalog, RuntimeSurface, TxHandle};
use crate::chain::{is_test_chain, ChainApi, ChainProperties};
use crate::config::{UiSettings, PREFIX_DEFAULT};
use crate::error::ApiError;
use crate::extension::{AccountRef, Extension, InjectedAccount};
use crate::format::DisplayDefaults;
use crate::keyring::{KeyType, Keyring, KeyringOptions};
use crate::ss58::{GENERIC_PREFIX, MAX_PREFIX};

pub const DEFAULT_TOKEN_SYMBOL: &str = "DEV";
pub const DEFAULT_TOKEN_DECIMALS: u32 = 15;
pub const KEYRING_KEY_TYPE: KeyType = KeyType::Ed25519;

/// Sections that have carried the privileged `setCode` call, newest first.
const SUDO_SECTIONS: [&str; 2] = ["system", "consensus"];
const SUDO_METHOD: &str = "setCode";

/// Everything the readiness sequence hands back to the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyState {
    pub chain: Option<String>,
    pub is_development: bool,
    pub is_substrate_v2: bool,
    pub default_tx: Option<TxHandle>,
    pub default_tx_sudo: Option<TxHandle>,
    pub injected_accounts: Vec<AccountRef>,
    pub address_prefix: u16,
    pub token: TokenDisplay,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenDisplay {
    pub symbol: String,
    pub decimals: u32,
}

impl TokenDisplay {
    pub fn from_properties(properties: &ChainProperties) -> Self {
        let symbol = match properties.token_symbol() {
            "" => DEFAULT_TOKEN_SYMBOL,
            symbol => symbol,
        };
        let decimals = match properties.token_decimals() {
            0 => DEFAULT_TOKEN_DECIMALS,
            decimals => decimals,
        };
        Self {
            symbol: symbol.to_string(),
            decimals,
        }
    }
}

/// `-1` selects the generic prefix; anything else must be a valid SS58 prefix.
pub fn resolve_address_prefix(setting: i32) -> Result<u16, ApiError> {
    if setting == PREFIX_DEFAULT {
        return Ok(GENERIC_PREFIX);
    }
    u16::try_from(setting)
        .ok()
        .filter(|prefix| *prefix <= MAX_PREFIX)
        .ok_or_else(|| ApiError::InvalidSetting(format!("address prefix {setting} out of range")))
}

pub fn decorate_accounts(accounts: Vec<InjectedAccount>) -> Vec<AccountRef> {
    accounts.into_iter().map(AccountRef::from).collect()
}

/// First method of the first section, in the catalog's own order.
pub fn default_tx(catalog: &MethodCatalog) -> Option<TxHandle> {
    catalog.first().cloned()
}

pub fn default_tx_sudo(catalog: &MethodCatalog, fallback: Option<&TxHandle>) -> Option<TxHandle> {
    SUDO_SECTIONS
        .iter()
        .find_map(|section| catalog.get(section, SUDO_METHOD))
        .or(fallback)
        .cloned()
}

pub struct ReadinessDeps<'a> {
    pub api: &'a dyn ChainApi,
    pub extension: &'a dyn Extension,
    pub keyring: &'a dyn Keyring,
    pub display: &'a dyn DisplayDefaults,
    pub settings: &'a UiSettings,
}

/// Chain facts gathered by the readiness fetches. Nothing has been
/// configured yet; see [`apply_chain`].
#[derive(Clone)]
pub struct ChainSnapshot {
    pub chain: Option<String>,
    pub runtime: Arc<RuntimeSurface>,
    pub injected_accounts: Vec<AccountRef>,
    pub address_prefix: u16,
    pub token: TokenDisplay,
    pub is_development: bool,
}

/// Fetch chain identity, token properties and injected accounts.
pub async fn fetch_chain(deps: &ReadinessDeps<'_>) -> Result<ChainSnapshot, ApiError> {
    let (properties, chain, injected) = tokio::try_join!(
        deps.api.system_properties(),
        deps.api.system_chain(),
        async { deps.extension.accounts().await.map(decorate_accounts) },
    )?;

    let runtime = deps
        .api
        .runtime()
        .ok_or(ApiError::NotReady("runtime metadata not loaded"))?;
    let address_prefix = resolve_address_prefix(deps.settings.prefix)?;
    let token = TokenDisplay::from_properties(&properties);
    let is_development = is_test_chain(chain.as_deref());

    info!(
        chain = chain.as_deref().unwrap_or_default(),
        symbol = %token.symbol,
        decimals = token.decimals,
        "api: found chain"
    );

    Ok(ChainSnapshot {
        chain,
        runtime,
        injected_accounts: injected,
        address_prefix,
        token,
        is_development,
    })
}

/// Configure the display and keyring collaborators from a snapshot and
/// derive the default transaction handles. Synchronous, so callers can run
/// it while holding whatever guards the snapshot's freshness.
pub fn apply_chain(deps: &ReadinessDeps<'_>, snapshot: ChainSnapshot) -> Result<ReadyState, ApiError> {
    let ChainSnapshot {
        chain,
        runtime,
        injected_accounts,
        address_prefix,
        token,
        is_development,
    } = snapshot;

    deps.display.set_balance_defaults(token.decimals, &token.symbol);
    deps.display.set_input_unit(&token.symbol);

    deps.keyring.load_all(
        KeyringOptions {
            address_prefix,
            genesis_hash: runtime.genesis_hash,
            is_development,
            key_type: KEYRING_KEY_TYPE,
        },
        &injected_accounts,
    )?;

    let default_tx = default_tx(&runtime.tx);
    let default_tx_sudo = default_tx_sudo(&runtime.tx, default_tx.as_ref());

    Ok(ReadyState {
        chain,
        is_development,
        is_substrate_v2: !runtime.consts.is_empty(),
        default_tx,
        default_tx_sudo,
        injected_accounts,
        address_prefix,
        token,
    })
}
