//! Upload transfer core for STOR and APPE.
//!
//! An upload touches two connections and one storage stream: the control
//! connection (commands in, replies out), the data connection carrying the
//! file bytes, and the destination opened on the storage backend. The
//! [`UploadOrchestrator`] drives one request end to end:
//!
//! 1. wait for the data connection (bounded),
//! 2. pause control intake and open the destination,
//! 3. reply `150`, resume the data connection, pipe bytes until both the
//!    data connection and the destination have settled,
//! 4. reply `226` or `550` (`425` on timeout), notify the [`EventSink`],
//! 5. release the data connection and resume control intake.
//!
//! Collaborators are injected through [`UploadContext`].

mod config;
mod event;
mod intake;
mod orchestrator;
mod outcome;
mod reply;
mod teardown;
mod transfer;

#[cfg(test)]
mod testing;

pub use config::UploadConfig;
pub use event::{ChannelEventSink, EventSink, TracingEventSink, TransferEvent};
pub use intake::{ControlIntake, IntakeGate};
pub use orchestrator::{UploadContext, UploadOrchestrator, UploadPhase};
pub use outcome::{FailureKind, TransferOutcome};
pub use reply::{ControlWriter, ReplyChannel};

use std::io;
use std::sync::Arc;

use ftpd_data_channel::DataChannelError;
use ftpd_protocol::{Reply, ReplyCode};

/// Which resource a transfer failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The data connection.
    Channel,
    /// The storage destination.
    Destination,
}

/// Errors that end an upload. Each maps to exactly one terminal reply.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    /// No storage backend is configured for the session.
    #[error("File system not instantiated")]
    Unavailable,

    /// The storage backend cannot write.
    #[error("Not supported by file system")]
    Unsupported,

    /// The client never opened the data connection.
    #[error("No connection established")]
    ConnectionTimeout,

    /// I/O failure on the data connection or the destination.
    #[error("{error}")]
    Transfer { side: Side, error: Arc<io::Error> },
}

impl UploadError {
    pub(crate) fn transfer(side: Side, error: io::Error) -> Self {
        Self::Transfer {
            side,
            error: Arc::new(error),
        }
    }

    pub fn reply_code(&self) -> ReplyCode {
        match self {
            Self::Unavailable => ReplyCode::FileUnavailable,
            Self::Unsupported => ReplyCode::NotSupported,
            Self::ConnectionTimeout => ReplyCode::CantOpenDataConnection,
            Self::Transfer { .. } => ReplyCode::FileUnavailable,
        }
    }

    /// The terminal reply for this error.
    pub fn reply(&self) -> Reply {
        Reply::with_text(self.reply_code(), self.to_string())
    }
}

impl From<DataChannelError> for UploadError {
    fn from(err: DataChannelError) -> Self {
        match err {
            DataChannelError::Timeout => Self::ConnectionTimeout,
            DataChannelError::Io(e) => Self::transfer(Side::Channel, e),
            other => Self::transfer(Side::Channel, io::Error::other(other.to_string())),
        }
    }
}
