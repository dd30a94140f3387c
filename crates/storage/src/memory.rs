//! In-memory storage backend.
//!
//! Files are buffered per destination and committed to the shared map when
//! the destination is finalized, so a file becomes visible only once its
//! upload has finished. Fault injection (write quota, failing commit,
//! read-only mode) makes it the backend of choice for exercising upload
//! error paths.
//!
//! ```ignore
//! let backend = MemoryBackend::new()
//!     .with_client_prefix("/virtual")
//!     .failing_after(1024);
//! ```

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use ftpd_protocol::BoxFuture;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::StorageError;
use crate::backend::{OpenedDestination, StorageBackend, WriteOptions};
use crate::destination::{Capabilities, Destination};

/// Largest file a restart offset may grow to. Gaps are zero-filled in memory.
const MAX_RESTART_END: usize = 256 * 1024 * 1024;

/// A call to [`StorageBackend::open_write`] seen by a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    pub path: String,
    pub options: WriteOptions,
}

struct Inner {
    files: HashMap<String, Vec<u8>>,
    opens: Vec<OpenRecord>,
    finished: Vec<String>,
    destroyed: Vec<(String, Option<String>)>,
    read_only: bool,
    capabilities: Capabilities,
    client_prefix: Option<String>,
    server_root: Option<String>,
    fail_after: Option<usize>,
    fail_on_close: bool,
}

/// Shared in-memory file map. Clones observe the same files.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// A writable backend whose destinations support close and destroy.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                files: HashMap::new(),
                opens: Vec::new(),
                finished: Vec::new(),
                destroyed: Vec::new(),
                read_only: false,
                capabilities: Capabilities::ALL,
                client_prefix: None,
                server_root: None,
                fail_after: None,
                fail_on_close: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Reports no write support.
    pub fn read_only(self) -> Self {
        self.lock().read_only = true;
        self
    }

    /// Overrides the shutdown primitives advertised by destinations.
    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.lock().capabilities = capabilities;
        self
    }

    /// Returns bundles whose client path is `prefix/<path>`.
    pub fn with_client_prefix(self, prefix: impl Into<String>) -> Self {
        self.lock().client_prefix = Some(prefix.into());
        self
    }

    /// Destinations declare `root/<path>` as their server path.
    pub fn with_server_root(self, root: impl Into<String>) -> Self {
        self.lock().server_root = Some(root.into());
        self
    }

    /// Writes fail once a destination has accepted `bytes` bytes.
    pub fn failing_after(self, bytes: usize) -> Self {
        self.lock().fail_after = Some(bytes);
        self
    }

    /// Finalizing a destination fails.
    pub fn failing_on_close(self) -> Self {
        self.lock().fail_on_close = true;
        self
    }

    /// Committed contents of `path`.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Seeds `path` with existing contents.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.lock().files.insert(path.into(), data.into());
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.lock().opens.clone()
    }

    /// Paths whose destinations were finalized successfully.
    pub fn finished(&self) -> Vec<String> {
        self.lock().finished.clone()
    }

    /// Every destroy call, with the reason it carried.
    pub fn destroyed(&self) -> Vec<(String, Option<String>)> {
        self.lock().destroyed.clone()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StorageBackend for MemoryBackend {
    fn supports_write(&self) -> bool {
        !self.lock().read_only
    }

    fn open_write<'a>(
        &'a self,
        path: &'a str,
        options: WriteOptions,
    ) -> BoxFuture<'a, Result<OpenedDestination, StorageError>> {
        Box::pin(async move {
            let mut inner = self.lock();
            if inner.read_only {
                return Err(StorageError::ReadOnly);
            }
            inner.opens.push(OpenRecord {
                path: path.to_string(),
                options,
            });

            let destination = MemoryDestination {
                key: path.to_string(),
                declared: inner
                    .server_root
                    .as_ref()
                    .map(|root| format!("{}/{}", root.trim_end_matches('/'), path)),
                buf: Vec::new(),
                options,
                capabilities: inner.capabilities,
                fail_after: inner.fail_after,
                fail_on_close: inner.fail_on_close,
                done: false,
                backend: Arc::clone(&self.inner),
            };
            debug!(path, append = options.append, start = options.start, "memory destination opened");

            Ok(match &inner.client_prefix {
                Some(prefix) => OpenedDestination::Bundle {
                    stream: Box::new(destination),
                    client_path: format!("{}/{}", prefix.trim_end_matches('/'), path),
                },
                None => OpenedDestination::Bare(Box::new(destination)),
            })
        })
    }
}

/// Buffer for one upload into a [`MemoryBackend`].
pub struct MemoryDestination {
    key: String,
    declared: Option<String>,
    buf: Vec<u8>,
    options: WriteOptions,
    capabilities: Capabilities,
    fail_after: Option<usize>,
    fail_on_close: bool,
    done: bool,
    backend: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "destination closed")
    }

    fn commit(&mut self) -> io::Result<()> {
        self.done = true;
        let data = std::mem::take(&mut self.buf);
        let mut inner = lock(&self.backend);

        if self.options.append {
            inner.files.entry(self.key.clone()).or_default().extend_from_slice(&data);
        } else if self.options.start == 0 {
            inner.files.insert(self.key.clone(), data);
        } else {
            let (start, end) = usize::try_from(self.options.start)
                .ok()
                .and_then(|start| Some((start, start.checked_add(data.len())?)))
                .filter(|&(_, end)| end <= MAX_RESTART_END)
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "restart offset out of range")
                })?;
            let existing = inner.files.entry(self.key.clone()).or_default();
            if existing.len() < end {
                existing.resize(end, 0);
            }
            existing[start..end].copy_from_slice(&data);
        }
        inner.finished.push(self.key.clone());
        Ok(())
    }
}

impl AsyncWrite for MemoryDestination {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(Err(Self::closed_error()));
        }

        let accepted = match this.fail_after {
            Some(limit) if this.buf.len() >= limit => {
                return Poll::Ready(Err(io::Error::other("storage quota exceeded")));
            }
            Some(limit) => buf.len().min(limit - this.buf.len()),
            None => buf.len(),
        };
        this.buf.extend_from_slice(&buf[..accepted]);
        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(this.commit())
    }
}

impl Destination for MemoryDestination {
    fn path(&self) -> Option<&str> {
        self.declared.as_deref()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            if self.done {
                return Err(Self::closed_error());
            }
            if self.fail_on_close {
                self.done = true;
                return Err(io::Error::other("commit failed"));
            }
            self.commit()
        })
    }

    fn destroy(&mut self, reason: Option<&io::Error>) {
        self.done = true;
        lock(&self.backend)
            .destroyed
            .push((self.key.clone(), reason.map(|e| e.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn file_visible_only_after_close() {
        let backend = MemoryBackend::new();
        let opened = backend
            .open_write("report.csv", WriteOptions::default())
            .await
            .unwrap();
        let mut stream = opened.normalize("report.csv").stream;

        stream.write_all(b"a,b\n").await.unwrap();
        assert!(backend.file("report.csv").is_none());

        stream.close().await.unwrap();
        assert_eq!(backend.file("report.csv").unwrap(), b"a,b\n");
        assert_eq!(backend.finished(), vec!["report.csv".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_commits_too() {
        let backend = MemoryBackend::new().with_capabilities(Capabilities::NONE);
        let opened = backend
            .open_write("a.txt", WriteOptions::default())
            .await
            .unwrap();
        let mut stream = opened.normalize("a.txt").stream;
        assert_eq!(stream.capabilities(), Capabilities::NONE);

        stream.write_all(b"x").await.unwrap();
        stream.shutdown().await.unwrap();
        assert_eq!(backend.file("a.txt").unwrap(), b"x");
    }

    #[tokio::test]
    async fn append_and_restart_offsets() {
        let backend = MemoryBackend::new();
        backend.insert("log", b"one".to_vec());
        backend.insert("bin", b"0123456789".to_vec());

        let append = WriteOptions {
            append: true,
            start: 0,
        };
        let mut s = backend.open_write("log", append).await.unwrap().normalize("log").stream;
        s.write_all(b"two").await.unwrap();
        s.close().await.unwrap();
        assert_eq!(backend.file("log").unwrap(), b"onetwo");

        let restart = WriteOptions {
            append: false,
            start: 8,
        };
        let mut s = backend.open_write("bin", restart).await.unwrap().normalize("bin").stream;
        s.write_all(b"abcd").await.unwrap();
        s.close().await.unwrap();
        assert_eq!(backend.file("bin").unwrap(), b"01234567abcd");

        assert_eq!(backend.opens().len(), 2);
        assert_eq!(backend.opens()[1].options, restart);
    }

    #[tokio::test]
    async fn out_of_range_restart_offset_fails_commit() {
        let backend = MemoryBackend::new();
        let far = WriteOptions {
            append: false,
            start: u64::MAX - 1,
        };
        let mut s = backend.open_write("huge", far).await.unwrap().normalize("huge").stream;
        s.write_all(b"abcd").await.unwrap();

        let err = s.close().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "restart offset out of range");
        assert!(backend.file("huge").is_none());

        let beyond_cap = WriteOptions {
            append: false,
            start: MAX_RESTART_END as u64,
        };
        let mut s = backend
            .open_write("sparse", beyond_cap)
            .await
            .unwrap()
            .normalize("sparse")
            .stream;
        s.write_all(b"x").await.unwrap();
        assert!(s.shutdown().await.is_err());
        assert!(backend.file("sparse").is_none());
    }

    #[tokio::test]
    async fn quota_fails_writes() {
        let backend = MemoryBackend::new().failing_after(4);
        let mut s = backend
            .open_write("q", WriteOptions::default())
            .await
            .unwrap()
            .normalize("q")
            .stream;

        let err = s.write_all(b"123456").await.unwrap_err();
        assert_eq!(err.to_string(), "storage quota exceeded");
    }

    #[tokio::test]
    async fn destroy_discards_buffer_and_records_reason() {
        let backend = MemoryBackend::new();
        let mut s = backend
            .open_write("d", WriteOptions::default())
            .await
            .unwrap()
            .normalize("d")
            .stream;
        s.write_all(b"partial").await.unwrap();

        let err = io::Error::other("connection reset");
        s.destroy(Some(&err));
        assert!(backend.file("d").is_none());
        assert_eq!(
            backend.destroyed(),
            vec![("d".to_string(), Some("connection reset".to_string()))]
        );
        assert!(s.write_all(b"more").await.is_err());
    }

    #[tokio::test]
    async fn prefixes_and_read_only() {
        let backend = MemoryBackend::new()
            .with_client_prefix("/virtual/")
            .with_server_root("mem://bucket");
        let n = backend
            .open_write("a.txt", WriteOptions::default())
            .await
            .unwrap()
            .normalize("a.txt");
        assert_eq!(n.client_path, "/virtual/a.txt");
        assert_eq!(n.server_path, "mem://bucket/a.txt");

        let ro = MemoryBackend::new().read_only();
        assert!(!ro.supports_write());
        assert!(matches!(
            ro.open_write("a", WriteOptions::default()).await,
            Err(StorageError::ReadOnly)
        ));
    }
}
