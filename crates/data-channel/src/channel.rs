//! The [`DataChannel`] abstraction.

use std::fmt;
use std::time::Duration;

use ftpd_protocol::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::DataChannelError;

/// A duplex byte stream carried by a data connection.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Lifecycle of a data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Negotiated but the peer has not connected yet.
    AwaitingEstablishment,
    /// Connected; the transport is available.
    Ready,
    /// Our write half has been shut down; reads may still be pending.
    Draining,
    /// Torn down. Terminal.
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AwaitingEstablishment => "awaiting_establishment",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A negotiated data connection.
///
/// The transport starts paused so no bytes are consumed before the reader
/// is wired up; callers must [`resume`](Self::resume) it explicitly.
/// [`end`](Self::end) and [`destroy`](Self::destroy) must tolerate being
/// called on a connection that is already draining or closed.
pub trait DataChannel: Send {
    /// Waits until the peer has connected, failing with
    /// [`DataChannelError::Timeout`] after `timeout`.
    fn wait_ready(&mut self, timeout: Duration) -> BoxFuture<'_, Result<(), DataChannelError>>;

    fn state(&self) -> ChannelState;

    /// The connected transport, once ready.
    fn transport(&mut self) -> Option<&mut dyn Transport>;

    /// Lets bytes flow out of the transport.
    fn resume(&mut self);

    /// Returns `true` while our write half is still open.
    fn is_writable(&self) -> bool {
        self.state() == ChannelState::Ready
    }

    /// Gracefully shuts down our write half.
    fn end(&mut self) -> BoxFuture<'_, ()>;

    /// Drops the connection immediately. `reason` is the error that caused
    /// the teardown, if any.
    fn destroy(&mut self, reason: Option<&std::io::Error>);
}
