pub mod api;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod error;
pub mod extension;
pub mod format;
pub mod keyring;
pub mod orchestrator;
pub mod provider;
pub mod readiness;
pub mod signer;
pub mod ss58;
pub mod state;

pub use api::Api;
pub use catalog::{ConstantsCatalog, MethodCatalog, RuntimeSurface, TxHandle, TxSection};
pub use chain::{ApiEvent, ChainApi, ChainProperties};
pub use config::{ApiConfig, UiSettings};
pub use error::{ApiError, ApiResult};
pub use extension::{AccountRef, Extension, InjectedAccount, InjectedMeta, NoExtension, StaticExtension};
pub use format::{BalanceFormatter, DisplayDefaults};
pub use keyring::{KeyType, Keyring, KeyringOptions, MemoryKeyring};
pub use orchestrator::{Collaborators, Connection, ConnectionOrchestrator, ReadinessOutcome};
pub use provider::{Provider, WsProvider};
pub use signer::{QueueSigner, QueueTxMessageSetStatus, QueueTxPayloadAdd, QueueTxStatus, SignerPayload, SignerResult, TxUpdate};
pub use state::{ApiContext, ConnectionState, ConnectionStatus};
