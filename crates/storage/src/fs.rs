//! Local filesystem backend.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use ftpd_protocol::BoxFuture;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::StorageError;
use crate::backend::{OpenedDestination, StorageBackend, WriteOptions};
use crate::destination::{Capabilities, Destination};
use crate::validation::normalize_client_path;

/// Stores uploads under a root directory.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a client path to a location under the root.
    pub fn resolve(&self, client_path: &str) -> Result<PathBuf, StorageError> {
        let relative = normalize_client_path(client_path)?;
        Ok(self.root.join(relative))
    }

    async fn open(&self, path: &str, options: WriteOptions) -> Result<OpenedDestination, StorageError> {
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut open = OpenOptions::new();
        if options.append {
            // Appends always land at the end; the restart offset has no
            // meaning for them.
            open.create(true).append(true);
        } else {
            // A restart keeps the bytes before the offset.
            open.create(true).write(true).truncate(options.start == 0);
        }
        let mut file = open.open(&full_path).await?;

        if !options.append && options.start > 0 {
            file.seek(SeekFrom::Start(options.start)).await?;
        }

        debug!(
            path = %full_path.display(),
            append = options.append,
            start = options.start,
            "destination opened"
        );

        let client_path = format!("/{}", normalize_client_path(path)?);
        Ok(OpenedDestination::Bundle {
            stream: Box::new(FsDestination::new(file, full_path)),
            client_path,
        })
    }
}

impl StorageBackend for FsBackend {
    fn open_write<'a>(
        &'a self,
        path: &'a str,
        options: WriteOptions,
    ) -> BoxFuture<'a, Result<OpenedDestination, StorageError>> {
        Box::pin(self.open(path, options))
    }
}

/// A file being written by an upload.
pub struct FsDestination {
    file: Option<File>,
    path: String,
}

impl FsDestination {
    fn new(file: File, path: PathBuf) -> Self {
        Self {
            file: Some(file),
            path: path.to_string_lossy().into_owned(),
        }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "destination closed"))
    }
}

impl AsyncWrite for FsDestination {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().file() {
            Ok(file) => Pin::new(file).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file() {
            Ok(file) => Pin::new(file).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file() {
            Ok(file) => Pin::new(file).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Destination for FsDestination {
    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Flushes buffered writes and syncs the file to disk.
    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let mut file = self
                .file
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "destination closed"))?;
            file.flush().await?;
            file.sync_all().await?;
            debug!(path = %self.path, "destination synced");
            Ok(())
        })
    }

    fn destroy(&mut self, reason: Option<&io::Error>) {
        if self.file.take().is_some() {
            if let Some(err) = reason {
                warn!(path = %self.path, "dropping partially written file: {err}");
            }
        }
    }
}
