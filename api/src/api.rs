//! Chain-API adapter over a [`Provider`].
//!
//! `Api` turns the transport's up/down status into [`ApiEvent`]s. It emits
//! `Connected` and then `Ready` once the runtime metadata for the new
//! connection has been loaded, and `Disconnected` when the transport drops.
//! `Ready` fires again after every reconnect.

use std::sync::Arc;

use async_trait::async_trait;
use codec::Decode;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::catalog::RuntimeSurface;
use crate::chain::{ApiEvent, ChainApi, ChainProperties};
use crate::error::ApiError;
use crate::provider::Provider;
use crate::signer::QueueSigner;

const EVENT_CHANNEL_SIZE: usize = 64;

type SharedRuntime = Arc<RwLock<Option<Arc<RuntimeSurface>>>>;

pub struct Api<P: Provider> {
    provider: Arc<P>,
    signer: QueueSigner,
    events: broadcast::Sender<ApiEvent>,
    runtime: SharedRuntime,
}

impl<P: Provider> Api<P> {
    /// Wrap a provider. Nothing is emitted until [`Api::start`] is called, so
    /// subscribers can attach first.
    pub fn new(provider: Arc<P>, signer: QueueSigner) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            provider,
            signer,
            events,
            runtime: Arc::new(RwLock::new(None)),
        }
    }

    pub fn start(&self) -> JoinHandle<()> {
        tokio::spawn(drive(
            self.provider.clone(),
            self.provider.status(),
            self.events.clone(),
            self.runtime.clone(),
        ))
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Stream of free balances for `account_id`, one item per storage change.
    pub async fn subscribe_free_balance(
        &self,
        account_id: &[u8; 32],
    ) -> Result<BoxStream<'static, Result<u128, ApiError>>, ApiError> {
        let key = format!("0x{}", hex::encode(build_system_account_key(account_id)));
        let stream = self
            .provider
            .subscribe(
                "state_subscribeStorage",
                vec![json!([key.clone()])],
                "state_unsubscribeStorage",
            )
            .await?;
        Ok(stream
            .map(move |item| item.and_then(|change| free_balance_from_change(&key, change)))
            .boxed())
    }

    /// One-shot read of the free balance for `account_id`.
    pub async fn query_free_balance(&self, account_id: &[u8; 32]) -> Result<u128, ApiError> {
        let key = format!("0x{}", hex::encode(build_system_account_key(account_id)));
        let value = self
            .provider
            .send("state_getStorage", vec![Value::from(key)])
            .await?;
        let data: Option<String> = serde_json::from_value(value)?;
        decode_free_balance(data.as_deref())
    }
}

async fn drive<P: Provider>(
    provider: Arc<P>,
    mut status: watch::Receiver<bool>,
    events: broadcast::Sender<ApiEvent>,
    runtime: SharedRuntime,
) {
    let mut was_connected = false;
    loop {
        let connected = *status.borrow_and_update();
        if connected && !was_connected {
            let _ = events.send(ApiEvent::Connected);
            tokio::select! {
                loaded = load_runtime(provider.as_ref()) => match loaded {
                    Ok(surface) => {
                        info!(
                            endpoint = provider.endpoint(),
                            genesis = %hex::encode(surface.genesis_hash),
                            const_sections = surface.consts.len(),
                            "runtime metadata loaded"
                        );
                        *runtime.write() = Some(Arc::new(surface));
                        let _ = events.send(ApiEvent::Ready);
                    }
                    Err(e) => {
                        error!(endpoint = provider.endpoint(), error = %e, "unable to load runtime metadata");
                    }
                },
                changed = status.changed() => {
                    if changed.is_err() {
                        debug!("provider status channel closed");
                        return;
                    }
                    // Any status change while connected means the transport
                    // dropped, even if it is already back up.
                    debug!(endpoint = provider.endpoint(), "connection changed while loading runtime metadata");
                    let _ = events.send(ApiEvent::Disconnected);
                    was_connected = false;
                    continue;
                }
            }
        } else if !connected && was_connected {
            let _ = events.send(ApiEvent::Disconnected);
        }
        was_connected = connected;

        if status.changed().await.is_err() {
            debug!("provider status channel closed");
            return;
        }
    }
}

async fn load_runtime<P: Provider + ?Sized>(provider: &P) -> Result<RuntimeSurface, ApiError> {
    let genesis: String =
        serde_json::from_value(provider.send("chain_getBlockHash", vec![json!(0u32)]).await?)?;
    let genesis_hash = hex_to_array(genesis.trim_start_matches("0x"))?;

    let metadata: String =
        serde_json::from_value(provider.send("state_getMetadata", vec![]).await?)?;
    let metadata = hex::decode(metadata.trim_start_matches("0x"))?;

    RuntimeSurface::from_metadata(genesis_hash, &metadata)
}

#[async_trait]
impl<P: Provider> ChainApi for Api<P> {
    fn subscribe_events(&self) -> broadcast::Receiver<ApiEvent> {
        self.events.subscribe()
    }

    async fn system_properties(&self) -> Result<ChainProperties, ApiError> {
        let value = self.provider.send("system_properties", vec![]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn system_chain(&self) -> Result<Option<String>, ApiError> {
        let value = self.provider.send("system_chain", vec![]).await?;
        let chain: String = serde_json::from_value(value)?;
        Ok((!chain.is_empty()).then_some(chain))
    }

    fn runtime(&self) -> Option<Arc<RuntimeSurface>> {
        self.runtime.read().clone()
    }

    fn signer(&self) -> &QueueSigner {
        &self.signer
    }
}

/// `state_subscribeStorage` notification payload.
#[derive(Debug, Deserialize)]
struct StorageChangeSet {
    #[allow(dead_code)]
    block: String,
    changes: Vec<(String, Option<String>)>,
}

fn free_balance_from_change(key: &str, change: Value) -> Result<u128, ApiError> {
    let change: StorageChangeSet = serde_json::from_value(change)?;
    let data = change
        .changes
        .into_iter()
        .find(|(changed, _)| changed.eq_ignore_ascii_case(key))
        .and_then(|(_, data)| data);
    decode_free_balance(data.as_deref())
}

#[derive(Debug, Decode)]
struct AccountData {
    free: u128,
    #[allow(dead_code)]
    reserved: u128,
    #[allow(dead_code)]
    frozen: u128,
    #[allow(dead_code)]
    flags: u128,
}

#[derive(Debug, Decode)]
struct AccountInfo {
    #[allow(dead_code)]
    nonce: u32,
    #[allow(dead_code)]
    consumers: u32,
    #[allow(dead_code)]
    providers: u32,
    #[allow(dead_code)]
    sufficients: u32,
    data: AccountData,
}

/// Missing storage means the account does not exist, so its balance is 0.
fn decode_free_balance(data_hex: Option<&str>) -> Result<u128, ApiError> {
    let Some(data_hex) = data_hex else {
        return Ok(0);
    };
    let data = hex::decode(data_hex.trim_start_matches("0x"))?;
    let info = AccountInfo::decode(&mut &data[..])
        .map_err(|e| ApiError::Serialization(format!("invalid AccountInfo data: {e}")))?;
    Ok(info.data.free)
}

pub(crate) fn hex_to_array(hex_str: &str) -> Result<[u8; 32], ApiError> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != 32 {
        return Err(ApiError::Serialization("expected 32-byte hash".into()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Key format: `twox_128("System") ++ twox_128("Account") ++ blake2_128_concat(account_id)`
pub fn build_system_account_key(account_id: &[u8; 32]) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 16 + 16 + 32);
    key.extend_from_slice(&sp_crypto_hashing::twox_128(b"System"));
    key.extend_from_slice(&sp_crypto_hashing::twox_128(b"Account"));
    key.extend_from_slice(&sp_crypto_hashing::blake2_128(account_id));
    key.extend_from_slice(account_id);
    key
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use codec::Encode;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::mock::MockProvider;
    use super::*;
    use crate::catalog::test_metadata;

    fn signer() -> QueueSigner {
        QueueSigner::new(Arc::new(|_, _, _| {}), Arc::new(|_, _, _| {}))
    }

    fn account_info_hex(free: u128) -> String {
        let mut bytes = Vec::new();
        (1u32, 0u32, 1u32, 0u32).encode_to(&mut bytes);
        (free, 0u128, 0u128, 0u128).encode_to(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }

    async fn next_event(rx: &mut broadcast::Receiver<ApiEvent>) -> ApiEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event in time")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn connect_loads_runtime_then_reports_ready() {
        let provider = Arc::new(MockProvider::new());
        provider.respond("chain_getBlockHash", json!(format!("0x{}", "11".repeat(32))));
        provider.respond(
            "state_getMetadata",
            json!(format!("0x{}", hex::encode(test_metadata::modern()))),
        );
        let api = Api::new(provider.clone(), signer());
        let mut events = api.subscribe_events();
        let _driver = api.start();

        provider.set_connected(true);
        assert_eq!(next_event(&mut events).await, ApiEvent::Connected);
        assert_eq!(next_event(&mut events).await, ApiEvent::Ready);
        let runtime = api.runtime().expect("runtime loaded");
        assert_eq!(runtime.genesis_hash, [0x11; 32]);
        assert_eq!(runtime.tx.first().unwrap().section, "balances");

        provider.set_connected(false);
        assert_eq!(next_event(&mut events).await, ApiEvent::Disconnected);
    }

    #[tokio::test]
    async fn metadata_failure_skips_ready() {
        let provider = Arc::new(MockProvider::new());
        provider.respond("chain_getBlockHash", json!(format!("0x{}", "11".repeat(32))));
        provider.respond("state_getMetadata", json!("0x00"));
        let api = Api::new(provider.clone(), signer());
        let mut events = api.subscribe_events();
        let _driver = api.start();

        provider.set_connected(true);
        assert_eq!(next_event(&mut events).await, ApiEvent::Connected);
        provider.set_connected(false);
        assert_eq!(next_event(&mut events).await, ApiEvent::Disconnected);
        assert!(api.runtime().is_none());
    }

    #[tokio::test]
    async fn reconnect_during_metadata_load_reports_disconnect() {
        let provider = Arc::new(MockProvider::new());
        provider.respond("chain_getBlockHash", json!(format!("0x{}", "11".repeat(32))));
        provider.respond(
            "state_getMetadata",
            json!(format!("0x{}", hex::encode(test_metadata::modern()))),
        );
        let release = Arc::new(Notify::new());
        provider.hold("state_getMetadata", release.clone());
        let api = Api::new(provider.clone(), signer());
        let mut events = api.subscribe_events();
        let _driver = api.start();

        provider.set_connected(true);
        assert_eq!(next_event(&mut events).await, ApiEvent::Connected);
        timeout(Duration::from_secs(5), provider.held.notified())
            .await
            .expect("metadata requested");

        provider.set_connected(false);
        provider.set_connected(true);
        assert_eq!(next_event(&mut events).await, ApiEvent::Disconnected);
        assert_eq!(next_event(&mut events).await, ApiEvent::Connected);
        assert!(api.runtime().is_none());

        release.notify_one();
        assert_eq!(next_event(&mut events).await, ApiEvent::Ready);
        assert_eq!(api.runtime().expect("runtime loaded").genesis_hash, [0x11; 32]);
        let metadata_calls = provider
            .calls
            .lock()
            .iter()
            .filter(|(method, _)| method == "state_getMetadata")
            .count();
        assert_eq!(metadata_calls, 2);
    }

    #[tokio::test]
    async fn chain_queries_parse_node_responses() {
        let provider = Arc::new(MockProvider::new());
        provider.respond("system_chain", json!(""));
        provider.respond(
            "system_properties",
            json!({ "ss58Format": 42, "tokenDecimals": 12, "tokenSymbol": "UNIT" }),
        );
        let api = Api::new(provider.clone(), signer());

        assert_eq!(api.system_chain().await.unwrap(), None);
        provider.respond("system_chain", json!("Development"));
        assert_eq!(api.system_chain().await.unwrap().as_deref(), Some("Development"));
        assert_eq!(api.system_properties().await.unwrap().token_symbol(), "UNIT");
    }

    #[tokio::test]
    async fn free_balance_reads_account_info() {
        let provider = Arc::new(MockProvider::new());
        let api = Api::new(provider.clone(), signer());
        let account = [3u8; 32];

        provider.respond("state_getStorage", Value::Null);
        assert_eq!(api.query_free_balance(&account).await.unwrap(), 0);

        provider.respond("state_getStorage", json!(account_info_hex(1_000)));
        assert_eq!(api.query_free_balance(&account).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn free_balance_subscription_follows_changes() {
        let provider = Arc::new(MockProvider::new());
        let account = [4u8; 32];
        let key = format!("0x{}", hex::encode(build_system_account_key(&account)));
        provider.notifications.lock().extend([
            json!({ "block": "0x01", "changes": [[key.clone(), account_info_hex(5)]] }),
            json!({ "block": "0x02", "changes": [[key.clone(), null]] }),
        ]);
        let api = Api::new(provider.clone(), signer());

        let values: Vec<u128> = api
            .subscribe_free_balance(&account)
            .await
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![5, 0]);

        let calls = provider.calls.lock();
        assert_eq!(calls[0].0, "state_subscribeStorage");
        assert_eq!(calls[0].1, vec![json!([key])]);
    }

    #[test]
    fn system_account_key_layout() {
        let key = build_system_account_key(&[0u8; 32]);
        assert_eq!(key.len(), 80);
        assert_eq!(
            hex::encode(&key[..32]),
            "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"
        );
        assert_eq!(&key[48..], &[0u8; 32]);
    }

    #[test]
    fn test_hex_to_array_valid() {
        let hex = "0000000000000000000000000000000000000000000000000000000000000001";
        let result = hex_to_array(hex).unwrap();
        assert_eq!(result[31], 1);
    }

    #[test]
    fn test_hex_to_array_invalid() {
        assert!(hex_to_array("0001").is_err());
        assert!(hex_to_array("gg00").is_err());
    }

    #[test]
    fn truncated_account_info_is_rejected() {
        assert!(decode_free_balance(Some("0x0102")).is_err());
    }
}
