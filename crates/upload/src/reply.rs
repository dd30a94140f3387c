//! Sending replies on the control connection.

use std::io;

use ftpd_protocol::{BoxFuture, Reply};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::trace;

/// Sends numeric replies to the client.
pub trait ReplyChannel: Send + Sync {
    fn send(&self, reply: Reply) -> BoxFuture<'_, io::Result<()>>;
}

/// Writes replies to the write half of a control connection.
pub struct ControlWriter<W> {
    writer: Mutex<W>,
}

impl<W> ControlWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> ReplyChannel for ControlWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn send(&self, reply: Reply) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let line = reply.to_string();
            trace!(code = reply.code.as_u16(), "sending reply");
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        })
    }
}
