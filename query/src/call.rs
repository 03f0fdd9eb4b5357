//! Latest-value tracking for subscribed queries.

use std::future::Future;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wallet_api::error::ApiError;

use crate::params::{is_callable, QueryParam};

pub type ResultStream<T> = BoxStream<'static, Result<T, ApiError>>;

/// The most recent value of a subscription. `None` until the first value
/// arrives, and forever `None` when no subscription was made.
pub struct Call<T> {
    latest: watch::Receiver<Option<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Drop for Call<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Call<T> {
    /// A call that never subscribed.
    pub fn idle() -> Self {
        let (_, latest) = watch::channel(None);
        Self { latest, task: None }
    }

    /// Follow `stream`, keeping the last good value when an item fails.
    pub fn from_stream(mut stream: ResultStream<T>) -> Self {
        let (tx, latest) = watch::channel(None);
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => {
                        tx.send_replace(Some(value));
                    }
                    Err(e) => warn!(error = %e, "query update failed"),
                }
            }
            debug!("query subscription ended");
        });
        Self {
            latest,
            task: Some(task),
        }
    }

    /// Subscribe through `subscribe` unless the params rule it out. A failed
    /// subscription is logged and yields an idle call.
    pub async fn subscribe<F, Fut>(params: &[QueryParam], subscribe: F) -> Self
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResultStream<T>, ApiError>>,
    {
        if !is_callable(params) {
            return Self::idle();
        }
        match subscribe().await {
            Ok(stream) => Self::from_stream(stream),
            Err(e) => {
                warn!(error = %e, "query subscription failed");
                Self::idle()
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.task.is_some()
    }

    pub fn latest(&self) -> Option<T> {
        self.latest.borrow().clone()
    }

    /// Wait for the next value. Returns `false` once no more can arrive.
    pub async fn changed(&mut self) -> bool {
        self.latest.changed().await.is_ok()
    }

    /// Wait until a first value is known, or the subscription has ended.
    pub async fn first(&mut self) -> Option<T> {
        let waited = self
            .latest
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone());
        match waited {
            Ok(value) => value,
            Err(_) => self.latest(),
        }
    }
}
