//! Free balance of a single account.

use async_trait::async_trait;
use wallet_api::api::Api;
use wallet_api::error::ApiError;
use wallet_api::provider::Provider;

use crate::call::{Call, ResultStream};
use crate::format_balance::FormatBalance;
use crate::params::QueryParam;

/// Source of free-balance subscriptions keyed by query params.
#[async_trait]
pub trait BalanceQuery: Send + Sync {
    async fn subscribe_free_balance(
        &self,
        params: &[QueryParam],
    ) -> Result<ResultStream<u128>, ApiError>;
}

/// `System.Account(account).data.free`; takes exactly one account param.
#[async_trait]
impl<P: Provider> BalanceQuery for Api<P> {
    async fn subscribe_free_balance(
        &self,
        params: &[QueryParam],
    ) -> Result<ResultStream<u128>, ApiError> {
        let [param] = params else {
            return Err(ApiError::InvalidArgument("free balance takes exactly one account"));
        };
        let account_id = param.account_id()?;
        Api::<P>::subscribe_free_balance(self, &account_id).await
    }
}

/// Stateless view of one account's balance. What it renders depends only on
/// its params and the latest query result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceView {
    pub params: Vec<QueryParam>,
    pub label: Option<String>,
    pub children: Option<String>,
}

impl BalanceView {
    pub fn new(params: Vec<QueryParam>) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_children(mut self, children: impl Into<String>) -> Self {
        self.children = Some(children.into());
        self
    }

    pub async fn subscribe<Q: BalanceQuery + ?Sized>(&self, query: &Q) -> Call<u128> {
        Call::subscribe(&self.params, || query.subscribe_free_balance(&self.params)).await
    }

    pub fn render(&self, latest: Option<u128>) -> FormatBalance {
        FormatBalance {
            label: self.label.clone(),
            value: latest,
            children: self.children.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;
    use futures::StreamExt;
    use wallet_api::format::{BalanceFormatter, DisplayDefaults};

    use super::*;

    #[derive(Default)]
    struct FixedBalances {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BalanceQuery for FixedBalances {
        async fn subscribe_free_balance(
            &self,
            params: &[QueryParam],
        ) -> Result<ResultStream<u128>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = params[0].account_id()?;
            Ok(stream::iter(vec![Ok(u128::from(id[0]) * 1_000)]).boxed())
        }
    }

    #[tokio::test]
    async fn subscribes_and_renders_latest_balance() {
        let query = FixedBalances::default();
        let view = BalanceView::new(vec![QueryParam::AccountId([7; 32])]).with_label("free ");
        let mut call = view.subscribe(&query).await;
        let latest = call.first().await;
        assert_eq!(latest, Some(7_000));

        let formatter = BalanceFormatter::new();
        formatter.set_balance_defaults(3, "DEV");
        assert_eq!(view.render(latest).render(&formatter), "free 7.0000 DEV");
        assert_eq!(query.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn placeholder_without_params() {
        let query = FixedBalances::default();
        for view in [
            BalanceView::default(),
            BalanceView::new(vec![QueryParam::Null]),
        ] {
            let call = view.subscribe(&query).await;
            assert!(!call.is_subscribed());
            let rendered = view
                .with_children(" !")
                .render(call.latest())
                .render(&BalanceFormatter::new());
            assert_eq!(rendered, "- !");
        }
        assert_eq!(query.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn render_is_pure() {
        let view = BalanceView::new(vec![QueryParam::AccountId([1; 32])])
            .with_label("a")
            .with_children("b");
        assert_eq!(view.render(Some(5)), view.render(Some(5)));
        assert_eq!(view.render(None).value, None);
    }
}
