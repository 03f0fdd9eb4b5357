//! JSON-RPC transport to a Substrate node.
//!
//! [`WsProvider`] keeps one WebSocket connection alive in a background task
//! and publishes its up/down status through a watch channel, so the chain-API
//! layer can turn transport changes into lifecycle events.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use jsonrpsee::core::client::{ClientT, SubscriptionClientT};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;

#[async_trait]
pub trait Provider: Send + Sync + 'static {
    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, ApiError>;

    async fn subscribe(
        &self,
        method: &str,
        params: Vec<Value>,
        unsubscribe: &str,
    ) -> Result<BoxStream<'static, Result<Value, ApiError>>, ApiError>;

    /// `true` while the transport is connected.
    fn status(&self) -> watch::Receiver<bool>;

    fn endpoint(&self) -> &str;
}

fn array_params(params: Vec<Value>) -> Result<ArrayParams, ApiError> {
    let mut out = ArrayParams::new();
    for param in params {
        out.insert(param)?;
    }
    Ok(out)
}

struct Shared {
    client: RwLock<Option<Arc<WsClient>>>,
    status: watch::Sender<bool>,
}

/// WebSocket provider with automatic reconnection.
pub struct WsProvider {
    shared: Arc<Shared>,
    config: ApiConfig,
    task: JoinHandle<()>,
}

impl WsProvider {
    /// Start connecting in the background. Must be called inside a tokio runtime.
    pub fn start(config: ApiConfig) -> Self {
        let (status, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            client: RwLock::new(None),
            status,
        });
        let task = tokio::spawn(maintain(shared.clone(), config.clone()));
        Self {
            shared,
            config,
            task,
        }
    }

    async fn client(&self) -> Result<Arc<WsClient>, ApiError> {
        self.shared
            .client
            .read()
            .await
            .clone()
            .filter(|client| client.is_connected())
            .ok_or_else(|| ApiError::NotConnected(self.config.endpoint.clone()))
    }
}

impl Drop for WsProvider {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn build_client(config: &ApiConfig) -> Result<WsClient, ApiError> {
    WsClientBuilder::default()
        .connection_timeout(config.connection_timeout)
        .request_timeout(config.request_timeout)
        .build(&config.endpoint)
        .await
        .map_err(|e| ApiError::Rpc(format!("Failed to connect to {}: {}", config.endpoint, e)))
}

async fn maintain(shared: Arc<Shared>, config: ApiConfig) {
    let mut backoff = config.reconnect_delay;
    loop {
        match build_client(&config).await {
            Ok(client) => {
                let client = Arc::new(client);
                *shared.client.write().await = Some(client.clone());
                backoff = config.reconnect_delay;
                info!(endpoint = %config.endpoint, "connected to node");
                shared.status.send_replace(true);

                client.on_disconnect().await;

                shared.client.write().await.take();
                shared.status.send_replace(false);
                warn!(endpoint = %config.endpoint, "disconnected from node");
            }
            Err(e) => {
                warn!(endpoint = %config.endpoint, error = %e, "connection attempt failed");
            }
        }
        sleep(backoff).await;
        backoff = (backoff * 2).min(config.max_reconnect_delay);
    }
}

#[async_trait]
impl Provider for WsProvider {
    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, ApiError> {
        let client = self.client().await?;
        client
            .request(method, array_params(params)?)
            .await
            .map_err(|e| ApiError::Rpc(format!("{method} failed: {e}")))
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Vec<Value>,
        unsubscribe: &str,
    ) -> Result<BoxStream<'static, Result<Value, ApiError>>, ApiError> {
        let client = self.client().await?;
        let subscription = client
            .subscribe::<Value, _>(method, array_params(params)?, unsubscribe)
            .await
            .map_err(|e| ApiError::Rpc(format!("Failed to subscribe to {method}: {e}")))?;
        Ok(subscription
            .map(|item| item.map_err(|e| ApiError::Rpc(e.to_string())))
            .boxed())
    }

    fn status(&self) -> watch::Receiver<bool> {
        self.shared.status.subscribe()
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn array_params_keep_order() {
        let params = array_params(vec![Value::from(0u32), Value::from("0xab")]).unwrap();
        let encoded = jsonrpsee::core::traits::ToRpcParams::to_rpc_params(params)
            .unwrap()
            .unwrap();
        assert_eq!(encoded.get(), r#"[0,"0xab"]"#);
    }

    #[tokio::test]
    async fn requests_fail_fast_while_disconnected() {
        let mut config = ApiConfig::with_endpoint("ws://127.0.0.1:1");
        config.connection_timeout = Duration::from_millis(100);
        config.reconnect_delay = Duration::from_secs(60);
        let provider = WsProvider::start(config);

        assert!(!*provider.status().borrow());
        let err = provider.send("system_chain", vec![]).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConnected(_)));
        assert_eq!(provider.endpoint(), "ws://127.0.0.1:1");
    }

    /// Requires a running Substrate node.
    #[tokio::test]
    #[ignore]
    async fn connects_to_local_node() {
        let provider = WsProvider::start(ApiConfig::default());
        let mut status = provider.status();
        status.wait_for(|up| *up).await.expect("status channel");
        let chain = provider.send("system_chain", vec![]).await.unwrap();
        assert!(chain.is_string());
    }
}
