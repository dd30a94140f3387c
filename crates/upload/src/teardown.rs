//! Resource wrappers whose teardown runs at most once.

use std::io;
use std::sync::Arc;

use ftpd_data_channel::DataChannel;
use ftpd_storage::Destination;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, warn};

/// The data connection for the duration of one upload.
pub(crate) struct ChannelLease<'a> {
    channel: &'a mut dyn DataChannel,
    released: bool,
}

impl<'a> ChannelLease<'a> {
    pub(crate) fn new(channel: &'a mut dyn DataChannel) -> Self {
        Self {
            channel,
            released: false,
        }
    }

    pub(crate) fn channel(&mut self) -> &mut dyn DataChannel {
        &mut *self.channel
    }

    #[cfg(test)]
    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    /// Ends our write half if it is still open, then destroys the
    /// connection. Later calls do nothing.
    pub(crate) async fn teardown(&mut self, reason: Option<&io::Error>) {
        if self.released {
            return;
        }
        self.released = true;

        if self.channel.is_writable() {
            self.channel.end().await;
        }
        self.channel.destroy(reason);
        debug!(state = %self.channel.state(), "data connection released");
    }
}

/// Lifecycle of the destination as seen by the transfer.
#[derive(Debug, Clone)]
pub(crate) enum DestinationState {
    Open,
    Finished,
    Errored(Arc<io::Error>),
    Closed,
}

/// An open destination plus a watch channel publishing its state.
pub(crate) struct TrackedDestination {
    stream: Box<dyn Destination>,
    state: watch::Sender<DestinationState>,
    torn_down: bool,
}

impl TrackedDestination {
    pub(crate) fn new(stream: Box<dyn Destination>) -> Self {
        let (state, _) = watch::channel(DestinationState::Open);
        Self {
            stream,
            state,
            torn_down: false,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DestinationState> {
        self.state.subscribe()
    }

    pub(crate) fn state(&self) -> DestinationState {
        self.state.borrow().clone()
    }

    fn fail(&self, err: io::Error) {
        self.state.send_replace(DestinationState::Errored(Arc::new(err)));
    }

    /// Writes the whole buffer and returns how many bytes the destination
    /// accepted. A short count means it errored; the error is published on
    /// the state channel.
    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            match self.stream.write(&buf[written..]).await {
                Ok(0) => {
                    self.fail(io::ErrorKind::WriteZero.into());
                    break;
                }
                Ok(n) => written += n,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }
        written
    }

    /// Finalizes the destination: `close` when supported, otherwise a
    /// plain shutdown. Returns `false` if that failed.
    pub(crate) async fn finish(&mut self) -> bool {
        let result = if self.stream.capabilities().close {
            self.stream.close().await
        } else {
            self.stream.shutdown().await
        };
        match result {
            Ok(()) => {
                self.state.send_replace(DestinationState::Finished);
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Tears the destination down after a data connection failure.
    pub(crate) async fn abort(&mut self, reason: &io::Error) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let caps = self.stream.capabilities();
        if caps.destroy {
            self.stream.destroy(Some(reason));
        } else {
            let result = if caps.close {
                self.stream.close().await
            } else {
                self.stream.shutdown().await
            };
            if let Err(e) = result {
                warn!("closing aborted destination failed: {e}");
            }
        }
        self.state.send_replace(DestinationState::Closed);
    }

    /// Releases the handle once the transfer has settled.
    pub(crate) fn release(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if self.stream.capabilities().destroy {
            let reason = match self.state() {
                DestinationState::Errored(e) => Some(e),
                _ => None,
            };
            self.stream.destroy(reason.as_deref());
        }
        self.state.send_replace(DestinationState::Closed);
    }
}
