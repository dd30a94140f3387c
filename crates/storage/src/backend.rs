use ftpd_protocol::BoxFuture;

use crate::StorageError;
use crate::destination::Destination;

/// How a destination is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Append to existing content instead of replacing it.
    pub append: bool,
    /// Byte offset at which writing starts (restart offset).
    pub start: u64,
}

/// What a backend hands back from [`StorageBackend::open_write`].
pub enum OpenedDestination {
    /// Just the stream; the client path is the requested path.
    Bare(Box<dyn Destination>),
    /// The stream plus the path the client should be told about.
    Bundle {
        stream: Box<dyn Destination>,
        client_path: String,
    },
}

/// An opened destination with both of its names resolved.
pub struct NormalizedDestination {
    pub stream: Box<dyn Destination>,
    /// Name reported to the client.
    pub client_path: String,
    /// Name used on the server side (logs, events).
    pub server_path: String,
}

impl OpenedDestination {
    /// Resolves client and server paths against the requested path.
    ///
    /// The server path is the stream's own declared path when it has one.
    pub fn normalize(self, requested: &str) -> NormalizedDestination {
        let (stream, client_path) = match self {
            Self::Bare(stream) => (stream, requested.to_string()),
            Self::Bundle {
                stream,
                client_path,
            } => (stream, client_path),
        };
        let server_path = stream
            .path()
            .map(str::to_string)
            .unwrap_or_else(|| requested.to_string());
        NormalizedDestination {
            stream,
            client_path,
            server_path,
        }
    }
}

impl std::fmt::Debug for OpenedDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare(stream) => f.debug_tuple("Bare").field(&stream.path()).finish(),
            Self::Bundle {
                stream,
                client_path,
            } => f
                .debug_struct("Bundle")
                .field("path", &stream.path())
                .field("client_path", client_path)
                .finish(),
        }
    }
}

/// A storage backend that can accept uploads.
pub trait StorageBackend: Send + Sync {
    /// Returns `false` for backends that cannot write at all.
    fn supports_write(&self) -> bool {
        true
    }

    /// Opens `path` for writing.
    fn open_write<'a>(
        &'a self,
        path: &'a str,
        options: WriteOptions,
    ) -> BoxFuture<'a, Result<OpenedDestination, StorageError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Capabilities;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::AsyncWrite;

    struct Sink(Option<&'static str>);

    impl AsyncWrite for Sink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl Destination for Sink {
        fn path(&self) -> Option<&str> {
            self.0
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }
    }

    #[test]
    fn bare_stream_uses_requested_path_for_both_names() {
        let opened = OpenedDestination::Bare(Box::new(Sink(None)));
        let n = opened.normalize("report.csv");
        assert_eq!(n.client_path, "report.csv");
        assert_eq!(n.server_path, "report.csv");
    }

    #[test]
    fn declared_path_becomes_server_path() {
        let opened = OpenedDestination::Bare(Box::new(Sink(Some("/srv/ftp/report.csv"))));
        let n = opened.normalize("report.csv");
        assert_eq!(n.client_path, "report.csv");
        assert_eq!(n.server_path, "/srv/ftp/report.csv");
    }

    #[test]
    fn bundle_client_path_is_kept() {
        let opened = OpenedDestination::Bundle {
            stream: Box::new(Sink(Some("/srv/ftp/a.txt"))),
            client_path: "/a.txt".into(),
        };
        let n = opened.normalize("a.txt");
        assert_eq!(n.client_path, "/a.txt");
        assert_eq!(n.server_path, "/srv/ftp/a.txt");
    }

    #[test]
    fn default_options_write_from_start() {
        let opts = WriteOptions::default();
        assert!(!opts.append);
        assert_eq!(opts.start, 0);
    }
}
