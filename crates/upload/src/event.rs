//! Transfer-outcome notifications.

use chrono::{DateTime, Utc};
use ftpd_protocol::TransferMode;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Emitted once per upload that got past the storage preconditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    pub id: Uuid,
    pub directive: TransferMode,
    pub at: DateTime<Utc>,
    /// Server-side path of the destination, when it was opened.
    pub server_path: Option<String>,
    /// Error message; `None` on success.
    pub error: Option<String>,
    pub bytes: u64,
}

impl TransferEvent {
    pub fn success(id: Uuid, directive: TransferMode, server_path: String, bytes: u64) -> Self {
        Self {
            id,
            directive,
            at: Utc::now(),
            server_path: Some(server_path),
            error: None,
            bytes,
        }
    }

    pub fn failure(
        id: Uuid,
        directive: TransferMode,
        server_path: Option<String>,
        error: String,
        bytes: u64,
    ) -> Self {
        Self {
            id,
            directive,
            at: Utc::now(),
            server_path,
            error: Some(error),
            bytes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Receives transfer outcomes. Must not block.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &TransferEvent);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn notify(&self, event: &TransferEvent) {
        match &event.error {
            None => info!(
                id = %event.id,
                directive = event.directive.directive(),
                path = event.server_path.as_deref().unwrap_or_default(),
                bytes = event.bytes,
                "transfer complete"
            ),
            Some(error) => warn!(
                id = %event.id,
                directive = event.directive.directive(),
                path = event.server_path.as_deref().unwrap_or_default(),
                bytes = event.bytes,
                error = %error,
                "transfer failed"
            ),
        }
    }
}

/// Forwards events to an mpsc receiver. Events are dropped when the
/// receiver is full or gone.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<TransferEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<TransferEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn notify(&self, event: &TransferEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!(id = %event.id, "dropping transfer event: {e}");
        }
    }
}
