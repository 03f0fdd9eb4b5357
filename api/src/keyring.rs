use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::extension::AccountRef;
use crate::ss58;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Sr25519,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringOptions {
    pub address_prefix: u16,
    pub genesis_hash: [u8; 32],
    pub is_development: bool,
    pub key_type: KeyType,
}

/// Account storage loaded once the chain is known.
pub trait Keyring: Send + Sync {
    fn load_all(&self, options: KeyringOptions, injected: &[AccountRef]) -> Result<(), ApiError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyringAccount {
    /// Address encoded with the keyring's prefix
    pub address: String,
    pub account_id: Option<[u8; 32]>,
    pub name: String,
    pub source: String,
    pub is_injected: bool,
}

#[derive(Debug, Default)]
struct Loaded {
    options: Option<KeyringOptions>,
    accounts: Vec<KeyringAccount>,
}

/// In-memory keyring. Loading again replaces the previous contents.
#[derive(Debug, Default)]
pub struct MemoryKeyring {
    inner: RwLock<Loaded>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().options.is_some()
    }

    pub fn options(&self) -> Option<KeyringOptions> {
        self.inner.read().options.clone()
    }

    pub fn accounts(&self) -> Vec<KeyringAccount> {
        self.inner.read().accounts.clone()
    }

    pub fn find(&self, address: &str) -> Option<KeyringAccount> {
        let wanted = ss58::account_id_from_str(address).ok();
        self.inner
            .read()
            .accounts
            .iter()
            .find(|account| {
                account.address == address
                    || (wanted.is_some() && account.account_id == wanted)
            })
            .cloned()
    }
}

impl Keyring for MemoryKeyring {
    fn load_all(&self, options: KeyringOptions, injected: &[AccountRef]) -> Result<(), ApiError> {
        let accounts = injected
            .iter()
            .map(|account| {
                let account_id = match ss58::account_id_from_str(&account.address) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(address = %account.address, error = %e, "keeping undecodable injected address as-is");
                        None
                    }
                };
                KeyringAccount {
                    address: account_id
                        .map(|id| ss58::encode(&id, options.address_prefix))
                        .unwrap_or_else(|| account.address.clone()),
                    account_id,
                    name: account.display_name.clone(),
                    source: account.source.clone(),
                    is_injected: true,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            accounts = accounts.len(),
            prefix = options.address_prefix,
            genesis = %hex::encode(options.genesis_hash),
            "keyring loaded"
        );
        let mut inner = self.inner.write();
        inner.options = Some(options);
        inner.accounts = accounts;
        Ok(())
    }
}
