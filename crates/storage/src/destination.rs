use std::io;

use ftpd_protocol::BoxFuture;
use tokio::io::AsyncWrite;

/// Shutdown primitives a destination supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// [`Destination::close`] finalizes the destination (flush, commit).
    pub close: bool,
    /// [`Destination::destroy`] releases the destination immediately.
    pub destroy: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        close: false,
        destroy: false,
    };

    pub const ALL: Capabilities = Capabilities {
        close: true,
        destroy: true,
    };
}

/// A writable destination returned by a [`StorageBackend`](crate::StorageBackend).
///
/// Bytes are written through `AsyncWrite`. Reaching the end of the input
/// does not finish the destination on its own: the caller finalizes it,
/// either with [`close`](Self::close) when [`Capabilities::close`] is set
/// or with `AsyncWriteExt::shutdown` otherwise.
pub trait Destination: AsyncWrite + Unpin + Send {
    /// Server-side path of the destination, if it has one.
    fn path(&self) -> Option<&str> {
        None
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Finalizes the destination. Only called when `capabilities().close`.
    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "destination does not support close",
            ))
        })
    }

    /// Releases the destination without finalizing it. Only called when
    /// `capabilities().destroy`. `reason` is the error that caused the
    /// teardown, if any.
    fn destroy(&mut self, reason: Option<&io::Error>) {
        let _ = reason;
    }
}
