//! Recording collaborators for orchestrator tests.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use ftpd_data_channel::{ChannelState, DataChannel, DataChannelError, Pausable, Transport};
use ftpd_protocol::{BoxFuture, Reply};
use ftpd_storage::{
    Capabilities, Destination, MemoryBackend, OpenedDestination, StorageBackend, StorageError,
    WriteOptions,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

use crate::{ControlIntake, EventSink, ReplyChannel, TransferEvent};

/// Ordered log shared by every recording collaborator in a test.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    /// Index of the first entry equal to `entry`. Panics when missing.
    pub(crate) fn position(&self, entry: &str) -> usize {
        let entries = self.entries();
        entries
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry:?} not in {entries:?}"))
    }

    pub(crate) fn contains_prefix(&self, prefix: &str) -> bool {
        self.entries().iter().any(|e| e.starts_with(prefix))
    }
}

fn reason_label(reason: Option<&io::Error>) -> String {
    reason.map_or_else(|| "none".to_string(), |e| e.to_string())
}

/// A data connection driven by the test.
pub(crate) struct MockChannel {
    journal: Journal,
    connects: bool,
    state: ChannelState,
    transport: Option<Pausable<Box<dyn Transport>>>,
}

impl MockChannel {
    /// An established channel; the returned stream is the client's end.
    pub(crate) fn ready(journal: Journal) -> (Self, DuplexStream) {
        let (server, client) = tokio::io::duplex(64 * 1024);
        (Self::with_transport(journal, server), client)
    }

    /// An established channel over an arbitrary transport.
    pub(crate) fn with_transport(journal: Journal, transport: impl Transport + 'static) -> Self {
        Self {
            journal,
            connects: true,
            state: ChannelState::Ready,
            transport: Some(Pausable::new(Box::new(transport) as Box<dyn Transport>)),
        }
    }

    /// A channel whose client never connects.
    pub(crate) fn never_ready(journal: Journal) -> Self {
        Self {
            journal,
            connects: false,
            state: ChannelState::AwaitingEstablishment,
            transport: None,
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.transport.as_ref().is_none_or(Pausable::is_paused)
    }
}

impl DataChannel for MockChannel {
    fn wait_ready(&mut self, timeout: Duration) -> BoxFuture<'_, Result<(), DataChannelError>> {
        Box::pin(async move {
            self.journal.push("channel.wait_ready");
            if self.connects {
                return Ok(());
            }
            tokio::time::sleep(timeout).await;
            self.state = ChannelState::Closed;
            Err(DataChannelError::Timeout)
        })
    }

    fn state(&self) -> ChannelState {
        self.state
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        self.transport.as_mut().map(|t| t as &mut dyn Transport)
    }

    fn resume(&mut self) {
        self.journal.push("channel.resume");
        if let Some(t) = self.transport.as_mut() {
            t.resume();
        }
    }

    fn end(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.journal.push("channel.end");
            if self.state != ChannelState::Ready {
                return;
            }
            if let Some(t) = self.transport.as_mut() {
                let _ = t.shutdown().await;
            }
            self.state = ChannelState::Draining;
        })
    }

    fn destroy(&mut self, reason: Option<&io::Error>) {
        self.journal
            .push(format!("channel.destroy({})", reason_label(reason)));
        self.transport = None;
        self.state = ChannelState::Closed;
    }
}

/// Yields `data`, then fails every read with `message`.
pub(crate) struct FailingReader {
    data: Vec<u8>,
    pos: usize,
    message: &'static str,
}

impl FailingReader {
    pub(crate) fn new(data: &[u8], message: &'static str) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            message,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.data.len() {
            let n = buf.remaining().min(this.data.len() - this.pos);
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            this.message,
        )))
    }
}

impl AsyncWrite for FailingReader {
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

/// Wraps a [`MemoryBackend`] and journals opens and destination shutdowns.
pub(crate) struct JournalBackend {
    inner: MemoryBackend,
    journal: Journal,
}

impl JournalBackend {
    pub(crate) fn new(inner: MemoryBackend, journal: Journal) -> Self {
        Self { inner, journal }
    }

    fn wrap(&self, stream: Box<dyn Destination>) -> Box<dyn Destination> {
        Box::new(JournalDestination {
            inner: stream,
            journal: self.journal.clone(),
        })
    }
}

impl StorageBackend for JournalBackend {
    fn supports_write(&self) -> bool {
        self.inner.supports_write()
    }

    fn open_write<'a>(
        &'a self,
        path: &'a str,
        options: WriteOptions,
    ) -> BoxFuture<'a, Result<OpenedDestination, StorageError>> {
        Box::pin(async move {
            self.journal.push(format!(
                "storage.open {path} append={} start={}",
                options.append, options.start
            ));
            Ok(match self.inner.open_write(path, options).await? {
                OpenedDestination::Bare(stream) => OpenedDestination::Bare(self.wrap(stream)),
                OpenedDestination::Bundle {
                    stream,
                    client_path,
                } => OpenedDestination::Bundle {
                    stream: self.wrap(stream),
                    client_path,
                },
            })
        })
    }
}

struct JournalDestination {
    inner: Box<dyn Destination>,
    journal: Journal,
}

impl AsyncWrite for JournalDestination {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.journal.push("dest.shutdown");
        Pin::new(&mut *this.inner).poll_shutdown(cx)
    }
}

impl Destination for JournalDestination {
    fn path(&self) -> Option<&str> {
        self.inner.path()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        self.journal.push("dest.close");
        self.inner.close()
    }

    fn destroy(&mut self, reason: Option<&io::Error>) {
        self.journal
            .push(format!("dest.destroy({})", reason_label(reason)));
        self.inner.destroy(reason);
    }
}

/// Journals every reply as `reply <code>` or `reply <code> <text>`.
pub(crate) struct RecordingReplies {
    journal: Journal,
    replies: Mutex<Vec<Reply>>,
    fail: bool,
}

impl RecordingReplies {
    pub(crate) fn new(journal: Journal) -> Self {
        Self {
            journal,
            replies: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Every send fails after being recorded.
    pub(crate) fn failing(journal: Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }

    pub(crate) fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }
}

impl ReplyChannel for RecordingReplies {
    fn send(&self, reply: Reply) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let entry = match &reply.text {
                Some(text) => format!("reply {} {text}", reply.code),
                None => format!("reply {}", reply.code),
            };
            self.journal.push(entry);
            self.replies.lock().unwrap().push(reply);
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "control closed"));
            }
            Ok(())
        })
    }
}

pub(crate) struct RecordingIntake {
    journal: Journal,
}

impl RecordingIntake {
    pub(crate) fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl ControlIntake for RecordingIntake {
    fn pause(&self) {
        self.journal.push("intake.pause");
    }

    fn resume(&self) {
        self.journal.push("intake.resume");
    }
}

/// Keeps every event and journals `event ok` or `event err <message>`.
pub(crate) struct RecordingEvents {
    journal: Journal,
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingEvents {
    pub(crate) fn new(journal: Journal) -> Self {
        Self {
            journal,
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    fn notify(&self, event: &TransferEvent) {
        match &event.error {
            None => self.journal.push("event ok"),
            Some(e) => self.journal.push(format!("event err {e}")),
        }
        self.events.lock().unwrap().push(event.clone());
    }
}
