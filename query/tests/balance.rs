use std::sync::Arc;

use async_trait::async_trait;
use codec::Encode;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::watch;
use wallet_api::api::build_system_account_key;
use wallet_api::format::{BalanceFormatter, DisplayDefaults};
use wallet_api::{Api, ApiError, Provider, QueueSigner};
use wallet_query::{BalanceQuery, BalanceView, QueryParam};

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

/// Replays canned storage notifications for whatever key is subscribed.
struct StorageFeed {
    frees: Vec<Option<u128>>,
    subscriptions: Mutex<Vec<(String, Vec<Value>)>>,
    status: watch::Sender<bool>,
}

impl StorageFeed {
    fn new(frees: Vec<Option<u128>>) -> Self {
        Self {
            frees,
            subscriptions: Mutex::new(Vec::new()),
            status: watch::channel(true).0,
        }
    }
}

fn account_info_hex(free: u128) -> String {
    let mut bytes = Vec::new();
    (0u32, 0u32, 1u32, 0u32).encode_to(&mut bytes);
    (free, 0u128, 0u128, 0u128).encode_to(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

#[async_trait]
impl Provider for StorageFeed {
    async fn send(&self, method: &str, _params: Vec<Value>) -> Result<Value, ApiError> {
        Err(ApiError::Rpc(format!("{method} failed: not scripted")))
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Vec<Value>,
        _unsubscribe: &str,
    ) -> Result<BoxStream<'static, Result<Value, ApiError>>, ApiError> {
        let key = params[0][0].as_str().unwrap_or_default().to_string();
        self.subscriptions.lock().push((method.to_string(), params));
        let changes: Vec<Result<Value, ApiError>> = self
            .frees
            .iter()
            .enumerate()
            .map(|(block, free)| {
                Ok(json!({
                    "block": format!("0x{block:02x}"),
                    "changes": [[key.clone(), free.map(account_info_hex)]],
                }))
            })
            .collect();
        Ok(stream::iter(changes).boxed())
    }

    fn status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    fn endpoint(&self) -> &str {
        "mock://storage"
    }
}

fn api(frees: Vec<Option<u128>>) -> (Arc<StorageFeed>, Api<StorageFeed>) {
    let provider = Arc::new(StorageFeed::new(frees));
    let signer = QueueSigner::new(Arc::new(|_, _, _| {}), Arc::new(|_, _, _| {}));
    (provider.clone(), Api::new(provider, signer))
}

#[tokio::test]
async fn balance_view_follows_system_account_storage() {
    let (provider, api) = api(vec![Some(1_000_000_000_000_000), None]);
    let view = BalanceView::new(vec![QueryParam::from(ALICE)]).with_label("available ");

    let mut call = view.subscribe(&api).await;
    assert!(call.is_subscribed());
    let mut seen = Vec::new();
    while call.changed().await {
        seen.push(call.latest());
    }
    assert_eq!(call.latest(), Some(0));
    assert!(seen.contains(&Some(0)));

    let formatter = BalanceFormatter::new();
    formatter.set_balance_defaults(15, "DEV");
    assert_eq!(
        view.render(Some(1_000_000_000_000_000)).render(&formatter),
        "available 1.0000 DEV"
    );

    let alice = wallet_api::ss58::account_id_from_str(ALICE).unwrap();
    let key = format!("0x{}", hex::encode(build_system_account_key(&alice)));
    let subscriptions = provider.subscriptions.lock();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].0, "state_subscribeStorage");
    assert_eq!(subscriptions[0].1, vec![json!([key])]);
}

#[tokio::test]
async fn placeholder_params_never_reach_the_node() {
    let (provider, api) = api(vec![Some(5)]);
    let formatter = BalanceFormatter::new();

    for params in [vec![], vec![QueryParam::Null], vec![QueryParam::from(None::<String>)]] {
        let view = BalanceView::new(params);
        let call = view.subscribe(&api).await;
        assert!(!call.is_subscribed());
        assert_eq!(view.render(call.latest()).render(&formatter), "-");
    }
    assert!(provider.subscriptions.lock().is_empty());
}

#[tokio::test]
async fn balance_query_needs_exactly_one_account() {
    let (_, api) = api(vec![]);
    let two = [QueryParam::AccountId([1; 32]), QueryParam::AccountId([2; 32])];
    let err = match BalanceQuery::subscribe_free_balance(&api, &two).await {
        Ok(_) => panic!("two accounts accepted"),
        Err(e) => e,
    };
    assert!(matches!(err, ApiError::InvalidArgument(_)));

    let bad = [QueryParam::Bytes(vec![0; 4])];
    assert!(BalanceQuery::subscribe_free_balance(&api, &bad).await.is_err());
}
