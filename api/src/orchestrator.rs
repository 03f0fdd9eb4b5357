//! Connection lifecycle orchestration.
//!
//! The orchestrator subscribes to the chain-API's lifecycle events and folds
//! them into a single [`ConnectionState`] held in a watch channel. A `Ready`
//! event triggers the readiness sequence (chain identity, injected accounts,
//! keyring and display setup). Its result is committed only if no disconnect
//! happened while it was in flight.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::Api;
use crate::chain::{ApiEvent, ChainApi};
use crate::config::UiSettings;
use crate::error::ApiError;
use crate::extension::Extension;
use crate::format::DisplayDefaults;
use crate::keyring::Keyring;
use crate::provider::Provider;
use crate::readiness::{apply_chain, fetch_chain, ReadinessDeps};
use crate::signer::{QueueSigner, QueueTxMessageSetStatus, QueueTxPayloadAdd};
use crate::state::{ApiContext, ConnectionState, ConnectionStatus};

/// Shared handles for the services the readiness sequence configures.
#[derive(Clone)]
pub struct Collaborators {
    pub extension: Arc<dyn Extension>,
    pub keyring: Arc<dyn Keyring>,
    pub display: Arc<dyn DisplayDefaults>,
    pub settings: UiSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Committed,
    /// A disconnect happened while the sequence was running.
    Stale,
}

pub struct ConnectionOrchestrator {
    api: Arc<dyn ChainApi>,
    collaborators: Collaborators,
    state: watch::Sender<ConnectionState>,
}

/// A running connection: orchestrator, typed API handle and background tasks.
pub struct Connection<P: Provider> {
    pub orchestrator: Arc<ConnectionOrchestrator>,
    pub api: Arc<Api<P>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<P: Provider> Drop for Connection<P> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl ConnectionOrchestrator {
    /// Build an orchestrator around an existing chain-API handle and start
    /// extension authorization. Events are not consumed until [`start`].
    ///
    /// [`start`]: ConnectionOrchestrator::start
    pub fn new(api: Arc<dyn ChainApi>, collaborators: Collaborators, app_name: &str) -> Arc<Self> {
        let initial = ConnectionState::new(collaborators.extension.is_injected());
        let (state, _) = watch::channel(initial);
        let orchestrator = Arc::new(Self {
            api,
            collaborators,
            state,
        });

        let this = orchestrator.clone();
        let app_name = app_name.to_string();
        tokio::spawn(async move {
            match this.collaborators.extension.enable(&app_name).await {
                Ok(()) => {
                    this.state.send_modify(|state| state.is_waiting_injected = false);
                }
                Err(e) => error!(app = %app_name, error = %e, "extension authorization failed"),
            }
        });

        orchestrator
    }

    /// Wire a provider into a chain-API handle with a queue-backed signer and
    /// start everything: event handling, the adapter driver and the
    /// transport diagnostics.
    pub fn connect<P: Provider>(
        provider: Arc<P>,
        queue_payload: QueueTxPayloadAdd,
        queue_set_tx_status: QueueTxMessageSetStatus,
        collaborators: Collaborators,
        app_name: &str,
    ) -> Connection<P> {
        let signer = QueueSigner::new(queue_payload, queue_set_tx_status);
        let api = Arc::new(Api::new(provider.clone(), signer));
        let orchestrator = Self::new(api.clone(), collaborators, app_name);

        // Subscribe before the driver starts so the first Connected is seen.
        let events = orchestrator.start();
        let driver = api.start();
        let diagnostics = tokio::spawn(log_diagnostics(provider));

        Connection {
            orchestrator,
            api,
            tasks: vec![events, driver, diagnostics],
        }
    }

    /// Subscribe to the chain-API's events and handle them until the event
    /// channel closes.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let events = self.api.subscribe_events();
        tokio::spawn(self.clone().run(events))
    }

    async fn run(self: Arc<Self>, mut events: broadcast::Receiver<ApiEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.on_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "api events lagged");
                }
                Err(RecvError::Closed) => {
                    debug!("api event channel closed");
                    return;
                }
            }
        }
    }

    pub fn on_event(self: &Arc<Self>, event: ApiEvent) {
        match event {
            ApiEvent::Connected => self.on_connected(),
            ApiEvent::Disconnected => self.on_disconnected(),
            ApiEvent::Ready => {
                // Pinned now: a Disconnected handled before the task is
                // polled must still invalidate this run.
                let generation = self.state.borrow().generation;
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.run_readiness_at(generation).await {
                        error!(error = %e, "Unable to load chain");
                    }
                });
            }
        }
    }

    fn on_connected(&self) {
        info!("api connected");
        self.state.send_modify(|state| {
            state.is_api_connected = true;
            state.status = ConnectionStatus::Connected;
        });
    }

    fn on_disconnected(&self) {
        warn!("api disconnected");
        self.state.send_modify(|state| {
            state.is_api_connected = false;
            state.status = ConnectionStatus::Disconnected;
            state.generation += 1;
        });
    }

    /// Run the readiness sequence for the current connection.
    pub async fn run_readiness(&self) -> Result<ReadinessOutcome, ApiError> {
        let generation = self.state.borrow().generation;
        self.run_readiness_at(generation).await
    }

    /// Run the readiness sequence on behalf of the connection identified by
    /// `generation`. Collaborators are configured and the result committed
    /// only if no disconnect has happened since.
    pub async fn run_readiness_at(&self, generation: u64) -> Result<ReadinessOutcome, ApiError> {
        let deps = self.readiness_deps();
        let snapshot = fetch_chain(&deps).await?;

        // Applied under the state lock so a disconnect cannot land between
        // the generation check and the commit.
        let mut applied = None;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            match apply_chain(&deps, snapshot) {
                Ok(ready) => {
                    state.status = ConnectionStatus::Ready;
                    state.is_api_ready = true;
                    state.chain = ready.chain;
                    state.is_development = ready.is_development;
                    state.is_substrate_v2 = ready.is_substrate_v2;
                    state.default_tx = ready.default_tx;
                    state.default_tx_sudo = ready.default_tx_sudo;
                    state.injected_accounts = ready.injected_accounts;
                    applied = Some(Ok(()));
                    true
                }
                Err(e) => {
                    applied = Some(Err(e));
                    false
                }
            }
        });

        match applied {
            Some(Ok(())) => Ok(ReadinessOutcome::Committed),
            Some(Err(e)) => Err(e),
            None => {
                warn!(generation, "discarding readiness result from a dropped connection");
                Ok(ReadinessOutcome::Stale)
            }
        }
    }

    fn readiness_deps(&self) -> ReadinessDeps<'_> {
        ReadinessDeps {
            api: self.api.as_ref(),
            extension: self.collaborators.extension.as_ref(),
            keyring: self.collaborators.keyring.as_ref(),
            display: self.collaborators.display.as_ref(),
            settings: &self.collaborators.settings,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn context(&self) -> ApiContext {
        self.state.borrow().context(self.api.clone())
    }

    pub fn api(&self) -> &Arc<dyn ChainApi> {
        &self.api
    }
}

/// Best-effort transport diagnostics issued once the first connection is up.
async fn log_diagnostics<P: Provider>(provider: Arc<P>) {
    let mut status = provider.status();
    if status.wait_for(|up| *up).await.is_err() {
        return;
    }

    match provider.send("system_networkState", vec![]).await {
        Ok(state) => info!(peer_id = state["peerId"].as_str().unwrap_or_default(), "network state"),
        Err(e) => warn!(error = %e, "network state unavailable"),
    }

    let mut heads = match provider
        .subscribe("chain_subscribeNewHeads", vec![], "chain_unsubscribeNewHeads")
        .await
    {
        Ok(heads) => heads,
        Err(e) => {
            warn!(error = %e, "new head subscription failed");
            return;
        }
    };
    while let Some(head) = heads.next().await {
        match head {
            Ok(head) => debug!(number = head_number(&head), "new head"),
            Err(e) => {
                warn!(error = %e, "new head subscription ended");
                return;
            }
        }
    }
}

fn head_number(head: &Value) -> u64 {
    head["number"]
        .as_str()
        .and_then(|n| u64::from_str_radix(n.trim_start_matches("0x"), 16).ok())
        .unwrap_or_default()
}
