//! Moving bytes from the data connection into the destination.
//!
//! Two completion signals run side by side on the caller's task:
//!
//! - destination completion resolves when the destination is finalized
//!   and rejects when it publishes an error;
//! - channel completion pipes the transport into the destination and, on
//!   end of stream, finalizes the destination. It rejects on a read error.
//!
//! The first rejection wins. The resource that did not originate the error
//! is then torn down carrying that same error.

use std::future::pending;
use std::io;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::teardown::{ChannelLease, DestinationState, TrackedDestination};
use crate::{Side, UploadError};

/// First failure seen by the transfer.
#[derive(Debug)]
struct TransferFault {
    side: Side,
    error: Arc<io::Error>,
}

impl TransferFault {
    fn new(side: Side, error: io::Error) -> Self {
        Self {
            side,
            error: Arc::new(error),
        }
    }
}

/// Result of [`run`]: bytes moved, and whether the transfer succeeded.
#[derive(Debug)]
pub(crate) struct TransferReport {
    pub bytes: u64,
    pub result: Result<(), UploadError>,
}

/// Resolves once the destination has been finalized; rejects with the
/// error it published.
async fn destination_done(mut state: watch::Receiver<DestinationState>) -> Result<(), TransferFault> {
    loop {
        let settled = match &*state.borrow_and_update() {
            DestinationState::Open => None,
            DestinationState::Finished | DestinationState::Closed => Some(Ok(())),
            DestinationState::Errored(e) => Some(Err(TransferFault {
                side: Side::Destination,
                error: Arc::clone(e),
            })),
        };
        if let Some(result) = settled {
            return result;
        }
        if state.changed().await.is_err() {
            // Sender gone without a verdict; let the channel side decide.
            return pending().await;
        }
    }
}

/// Copies the transport into the destination until end of stream, then
/// finalizes the destination. Destination failures are left to
/// [`destination_done`] to report.
async fn channel_done(
    lease: &mut ChannelLease<'_>,
    destination: &mut TrackedDestination,
    buffer_size: usize,
    bytes: &mut u64,
) -> Result<(), TransferFault> {
    let Some(transport) = lease.channel().transport() else {
        return Err(TransferFault::new(
            Side::Channel,
            io::Error::new(io::ErrorKind::NotConnected, "data connection not established"),
        ));
    };

    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = match transport.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => return Err(TransferFault::new(Side::Channel, e)),
        };
        if n == 0 {
            break;
        }
        let written = destination.write_all(&buf[..n]).await;
        *bytes += written as u64;
        if written < n {
            return pending().await;
        }
        trace!(n, total = *bytes, "chunk written");
    }

    debug!(bytes = *bytes, "data connection exhausted, finalizing destination");
    if !destination.finish().await {
        return pending().await;
    }
    Ok(())
}

/// Runs the transfer to completion. The data connection must already
/// have been resumed.
pub(crate) async fn run(
    lease: &mut ChannelLease<'_>,
    destination: &mut TrackedDestination,
    buffer_size: usize,
) -> TransferReport {
    let mut bytes = 0u64;
    let joined = tokio::try_join!(
        destination_done(destination.subscribe()),
        channel_done(lease, destination, buffer_size, &mut bytes),
    );

    let result = match joined {
        Ok(_) => Ok(()),
        Err(TransferFault { side, error }) => {
            debug!(?side, "transfer failed: {error}");
            match side {
                Side::Destination => lease.teardown(Some(&error)).await,
                Side::Channel => destination.abort(&error).await,
            }
            Err(UploadError::Transfer { side, error })
        }
    };

    TransferReport { bytes, result }
}
