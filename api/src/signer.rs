//! Signing through the UI transaction queue.
//!
//! The signer never holds keys. Each payload is handed to the queue, and the
//! queue answers once the user approves (or rejects) it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::catalog::TxHandle;
use crate::error::ApiError;

/// What is shown to the user for approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerPayload {
    pub address: String,
    pub call: TxHandle,
    /// SCALE-encoded signing payload
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerResult {
    pub id: u64,
    pub signature: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueTxStatus {
    Future,
    Ready,
    Broadcast,
    InBlock,
    Retracted,
    FinalityTimeout,
    Finalized,
    Usurped,
    Dropped,
    Invalid,
    Cancelled,
    Completed,
    Error,
    Incomplete,
    Queued,
    Qr,
    Signing,
    Sending,
    Sent,
    Blocked,
}

/// Progress reported back for a queued payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxUpdate {
    /// Submitted; carries the extrinsic hash.
    Hash([u8; 32]),
    Status(QueueTxStatus),
}

/// Adds a payload to the queue. The responder receives `None` on rejection.
pub type QueueTxPayloadAdd =
    Arc<dyn Fn(u64, SignerPayload, oneshot::Sender<Option<SignerResult>>) + Send + Sync>;

/// Sets the displayed status of a queued payload.
pub type QueueTxMessageSetStatus = Arc<dyn Fn(u64, QueueTxStatus, Option<String>) + Send + Sync>;

#[derive(Clone)]
pub struct QueueSigner {
    queue_payload: QueueTxPayloadAdd,
    queue_set_tx_status: QueueTxMessageSetStatus,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for QueueSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSigner")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl QueueSigner {
    pub fn new(
        queue_payload: QueueTxPayloadAdd,
        queue_set_tx_status: QueueTxMessageSetStatus,
    ) -> Self {
        Self {
            queue_payload,
            queue_set_tx_status,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a payload and wait for the user's decision.
    pub async fn sign_payload(&self, payload: SignerPayload) -> Result<SignerResult, ApiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        debug!(id, call = %payload.call, "queueing payload for signing");
        (self.queue_payload)(id, payload, tx);
        match rx.await {
            Ok(Some(result)) => Ok(result),
            Ok(None) | Err(_) => Err(ApiError::Signer("Unable to sign".into())),
        }
    }

    pub fn update(&self, id: u64, update: TxUpdate) {
        match update {
            TxUpdate::Hash(hash) => {
                (self.queue_set_tx_status)(
                    id,
                    QueueTxStatus::Sent,
                    Some(format!("0x{}", hex::encode(hash))),
                );
            }
            TxUpdate::Status(status) => (self.queue_set_tx_status)(id, status, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn payload() -> SignerPayload {
        SignerPayload {
            address: "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".into(),
            call: TxHandle {
                section: "balances".into(),
                method: "transferAllowDeath".into(),
                pallet_index: 5,
                call_index: 0,
            },
            payload: vec![1, 2, 3],
        }
    }

    fn ignore_status() -> QueueTxMessageSetStatus {
        Arc::new(|_, _, _| {})
    }

    #[tokio::test]
    async fn approved_payload_resolves() {
        let add: QueueTxPayloadAdd = Arc::new(|id, _payload, responder| {
            let _ = responder.send(Some(SignerResult {
                id,
                signature: vec![9; 64],
            }));
        });
        let signer = QueueSigner::new(add, ignore_status());

        let first = signer.sign_payload(payload()).await.unwrap();
        let second = signer.sign_payload(payload()).await.unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
        assert_eq!(first.signature.len(), 64);
    }

    #[tokio::test]
    async fn rejected_payload_errors() {
        let add: QueueTxPayloadAdd = Arc::new(|_, _, responder| {
            let _ = responder.send(None);
        });
        let signer = QueueSigner::new(add, ignore_status());
        let err = signer.sign_payload(payload()).await.unwrap_err();
        assert!(matches!(err, ApiError::Signer(_)));
    }

    #[tokio::test]
    async fn dropped_responder_errors() {
        let add: QueueTxPayloadAdd = Arc::new(|_, _, responder| drop(responder));
        let signer = QueueSigner::new(add, ignore_status());
        assert!(signer.sign_payload(payload()).await.is_err());
    }

    #[test]
    fn updates_are_forwarded_to_queue() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let status: QueueTxMessageSetStatus = Arc::new(move |id, status, detail| {
            sink.lock().push((id, status, detail));
        });
        let signer = QueueSigner::new(Arc::new(|_, _, _| {}), status);

        signer.update(3, TxUpdate::Hash([0xab; 32]));
        signer.update(4, TxUpdate::Status(QueueTxStatus::Finalized));

        let seen = seen.lock();
        assert_eq!(seen[0].0, 3);
        assert_eq!(seen[0].1, QueueTxStatus::Sent);
        assert_eq!(seen[0].2.as_deref(), Some(format!("0x{}", "ab".repeat(32)).as_str()));
        assert_eq!(seen[1], (4, QueueTxStatus::Finalized, None));
    }
}
