use serde::Serialize;

use crate::{Side, UploadError};

/// Why an upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unavailable,
    Unsupported,
    ConnectionTimeout,
    ChannelError,
    DestinationError,
}

/// Result of one [`execute`](crate::UploadOrchestrator::execute) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Success {
        server_path: String,
        client_path: String,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<&UploadError> for TransferOutcome {
    fn from(err: &UploadError) -> Self {
        let kind = match err {
            UploadError::Unavailable => FailureKind::Unavailable,
            UploadError::Unsupported => FailureKind::Unsupported,
            UploadError::ConnectionTimeout => FailureKind::ConnectionTimeout,
            UploadError::Transfer {
                side: Side::Channel,
                ..
            } => FailureKind::ChannelError,
            UploadError::Transfer {
                side: Side::Destination,
                ..
            } => FailureKind::DestinationError,
        };
        Self::Failure {
            kind,
            message: err.to_string(),
        }
    }
}
