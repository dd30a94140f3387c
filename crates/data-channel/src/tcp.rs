//! TCP data connection.
//!
//! Passive mode binds a listener and accepts a single connection from the
//! client; active mode connects out to the address the client announced.
//! Either way the connection is only established inside
//! [`DataChannel::wait_ready`], bounded by a timeout and the server's
//! cancellation token.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use ftpd_protocol::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{ChannelState, DataChannel, Transport};
use crate::error::DataChannelError;
use crate::pausable::Pausable;

enum Establish {
    Passive(TcpListener),
    Active(SocketAddr),
}

/// A data connection over TCP.
pub struct TcpDataChannel {
    pending: Option<Establish>,
    stream: Option<Pausable<TcpStream>>,
    state: ChannelState,
    peer: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl TcpDataChannel {
    /// Binds a passive listener on `addr` (port 0 = OS-assigned).
    ///
    /// The caller reports [`local_addr`](Self::local_addr) to the client
    /// before handing the channel to an upload.
    pub async fn bind_passive(
        addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<Self, DataChannelError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "passive data listener bound");
        Ok(Self::passive(listener, cancel))
    }

    /// Wraps an already bound passive listener.
    pub fn passive(listener: TcpListener, cancel: CancellationToken) -> Self {
        Self::awaiting(Establish::Passive(listener), cancel)
    }

    /// Connects to `addr` once [`wait_ready`](DataChannel::wait_ready) runs.
    pub fn active(addr: SocketAddr, cancel: CancellationToken) -> Self {
        Self::awaiting(Establish::Active(addr), cancel)
    }

    fn awaiting(pending: Establish, cancel: CancellationToken) -> Self {
        Self {
            pending: Some(pending),
            stream: None,
            state: ChannelState::AwaitingEstablishment,
            peer: None,
            cancel,
        }
    }

    /// Address of the passive listener, if this channel has one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.pending {
            Some(Establish::Passive(listener)) => listener.local_addr().ok(),
            _ => self.stream.as_ref().and_then(|s| s.get_ref().local_addr().ok()),
        }
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    async fn establish(&mut self, timeout: Duration) -> Result<(), DataChannelError> {
        let pending = self.pending.take().ok_or(DataChannelError::Closed)?;

        let connect = async {
            match pending {
                Establish::Passive(listener) => {
                    // Only one connection per transfer; the listener is
                    // dropped once this future completes.
                    listener.accept().await
                }
                Establish::Active(addr) => TcpStream::connect(addr).await.map(|s| (s, addr)),
            }
        };

        let (stream, addr) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.state = ChannelState::Closed;
                return Err(DataChannelError::Cancelled);
            }
            result = tokio::time::timeout(timeout, connect) => {
                match result {
                    Ok(Ok(pair)) => pair,
                    Ok(Err(e)) => {
                        self.state = ChannelState::Closed;
                        return Err(e.into());
                    }
                    Err(_) => {
                        self.state = ChannelState::Closed;
                        return Err(DataChannelError::Timeout);
                    }
                }
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {e}");
        }

        info!(%addr, "data connection established");
        self.peer = Some(addr);
        self.stream = Some(Pausable::new(stream));
        self.state = ChannelState::Ready;
        Ok(())
    }
}

impl DataChannel for TcpDataChannel {
    fn wait_ready(&mut self, timeout: Duration) -> BoxFuture<'_, Result<(), DataChannelError>> {
        Box::pin(async move {
            match self.state {
                ChannelState::AwaitingEstablishment => self.establish(timeout).await,
                ChannelState::Ready | ChannelState::Draining => Ok(()),
                ChannelState::Closed => Err(DataChannelError::Closed),
            }
        })
    }

    fn state(&self) -> ChannelState {
        self.state
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        self.stream.as_mut().map(|s| s as &mut dyn Transport)
    }

    fn resume(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.resume();
        }
    }

    fn end(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.state != ChannelState::Ready {
                return;
            }
            if let Some(stream) = self.stream.as_mut() {
                if let Err(e) = stream.shutdown().await {
                    debug!("data connection shutdown: {e}");
                }
            }
            self.state = ChannelState::Draining;
        })
    }

    fn destroy(&mut self, reason: Option<&io::Error>) {
        if self.state == ChannelState::Closed {
            return;
        }
        match reason {
            Some(err) => warn!(peer = ?self.peer, "destroying data connection: {err}"),
            None => debug!(peer = ?self.peer, "closing data connection"),
        }
        self.pending = None;
        self.stream = None;
        self.state = ChannelState::Closed;
    }
}
