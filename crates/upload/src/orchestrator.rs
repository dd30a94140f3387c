//! The upload state machine.

use std::fmt;
use std::sync::Arc;

use ftpd_data_channel::DataChannel;
use ftpd_protocol::{Reply, ReplyCode, TransferMode, UploadRequest};
use ftpd_storage::{NormalizedDestination, StorageBackend, WriteOptions};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::event::{EventSink, TransferEvent};
use crate::intake::ControlIntake;
use crate::outcome::TransferOutcome;
use crate::reply::ReplyChannel;
use crate::teardown::{ChannelLease, TrackedDestination};
use crate::transfer;
use crate::{Side, UploadError};

/// Collaborators supplied by the session hosting the orchestrator.
#[derive(Clone)]
pub struct UploadContext {
    /// `None` when the session has no file system mounted.
    pub storage: Option<Arc<dyn StorageBackend>>,
    pub replies: Arc<dyn ReplyChannel>,
    pub intake: Arc<dyn ControlIntake>,
    pub events: Arc<dyn EventSink>,
}

impl UploadContext {
    pub fn new(
        replies: Arc<dyn ReplyChannel>,
        intake: Arc<dyn ControlIntake>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            storage: None,
            replies,
            intake,
            events,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }
}

/// Where the orchestrator is in the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    AwaitingChannel,
    Transferring,
    Succeeded,
    Failed,
    Releasing,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingChannel => "awaiting_channel",
            Self::Transferring => "transferring",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Releasing => "releasing",
        };
        f.write_str(s)
    }
}

/// How the transfer part of a request ended.
struct Settled {
    server_path: Option<String>,
    bytes: u64,
    result: Result<String, UploadError>,
}

impl Settled {
    fn failed(error: UploadError) -> Self {
        Self {
            server_path: None,
            bytes: 0,
            result: Err(error),
        }
    }
}

/// Runs STOR and APPE requests for one control session.
///
/// Holds the session's pending restart offset (set by REST). The offset is
/// consumed by the next request and reset to zero whatever its outcome. A
/// request that carries its own non-zero offset overrides the pending one.
pub struct UploadOrchestrator {
    ctx: UploadContext,
    config: UploadConfig,
    restart_offset: u64,
    phase: UploadPhase,
}

impl UploadOrchestrator {
    pub fn new(ctx: UploadContext, config: UploadConfig) -> Self {
        Self {
            ctx,
            config,
            restart_offset: 0,
            phase: UploadPhase::Idle,
        }
    }

    pub fn set_restart_offset(&mut self, offset: u64) {
        self.restart_offset = offset;
    }

    pub fn restart_offset(&self) -> u64 {
        self.restart_offset
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Builds a request carrying the pending restart offset.
    pub fn request(&self, path: impl Into<String>, mode: TransferMode) -> UploadRequest {
        UploadRequest::new(path, mode).with_resume_offset(self.restart_offset)
    }

    /// Runs one upload over `channel` and sends its terminal reply.
    ///
    /// Never fails: every error is reported to the client and reflected in
    /// the returned outcome. Control intake is resumed exactly once before
    /// this returns.
    pub async fn execute(
        &mut self,
        request: UploadRequest,
        channel: &mut dyn DataChannel,
    ) -> TransferOutcome {
        let id = Uuid::new_v4();
        let span = info_span!(
            "upload",
            %id,
            directive = request.mode.directive(),
            path = %request.target_path
        );
        self.execute_inner(id, request, channel).instrument(span).await
    }

    async fn execute_inner(
        &mut self,
        id: Uuid,
        mut request: UploadRequest,
        channel: &mut dyn DataChannel,
    ) -> TransferOutcome {
        if request.resume_offset == 0 {
            request.resume_offset = self.restart_offset;
        }

        let storage = match self.preflight() {
            Ok(storage) => storage,
            Err(err) => {
                warn!("upload rejected: {err}");
                self.set_phase(UploadPhase::Failed);
                self.send(err.reply()).await;
                self.restart_offset = 0;
                self.ctx.intake.resume();
                self.set_phase(UploadPhase::Idle);
                return TransferOutcome::from(&err);
            }
        };

        info!(offset = request.resume_offset, "upload started");
        let mut lease = ChannelLease::new(channel);
        let settled = self.transfer(&request, storage.as_ref(), &mut lease).await;

        let outcome = match settled.result {
            Ok(client_path) => {
                self.set_phase(UploadPhase::Succeeded);
                let server_path = settled
                    .server_path
                    .unwrap_or_else(|| request.target_path.clone());
                info!(bytes = settled.bytes, %server_path, "upload complete");

                self.send(Reply::with_text(ReplyCode::TransferComplete, client_path.clone()))
                    .await;
                self.ctx.events.notify(&TransferEvent::success(
                    id,
                    request.mode,
                    server_path.clone(),
                    settled.bytes,
                ));
                TransferOutcome::Success {
                    server_path,
                    client_path,
                }
            }
            Err(err) => {
                self.set_phase(UploadPhase::Failed);
                warn!(bytes = settled.bytes, "upload failed: {err}");

                self.send(err.reply()).await;
                self.ctx.events.notify(&TransferEvent::failure(
                    id,
                    request.mode,
                    settled.server_path,
                    err.to_string(),
                    settled.bytes,
                ));
                TransferOutcome::from(&err)
            }
        };

        self.set_phase(UploadPhase::Releasing);
        lease.teardown(None).await;
        self.restart_offset = 0;
        self.ctx.intake.resume();
        self.set_phase(UploadPhase::Idle);
        outcome
    }

    fn preflight(&self) -> Result<Arc<dyn StorageBackend>, UploadError> {
        let storage = self.ctx.storage.as_ref().ok_or(UploadError::Unavailable)?;
        if !storage.supports_write() {
            return Err(UploadError::Unsupported);
        }
        Ok(Arc::clone(storage))
    }

    /// Everything between the readiness wait and the settled transfer.
    async fn transfer(
        &mut self,
        request: &UploadRequest,
        storage: &dyn StorageBackend,
        lease: &mut ChannelLease<'_>,
    ) -> Settled {
        self.set_phase(UploadPhase::AwaitingChannel);
        if let Err(e) = lease.channel().wait_ready(self.config.data_timeout()).await {
            return Settled::failed(e.into());
        }

        self.ctx.intake.pause();

        let options = WriteOptions {
            append: request.mode.is_append(),
            start: request.resume_offset,
        };
        let opened = storage.open_write(&request.target_path, options).await;
        self.restart_offset = 0;
        let opened = match opened {
            Ok(opened) => opened,
            Err(e) => return Settled::failed(UploadError::transfer(Side::Destination, e.into())),
        };

        let NormalizedDestination {
            stream,
            client_path,
            server_path,
        } = opened.normalize(&request.target_path);
        debug!(%client_path, %server_path, "destination ready");
        let mut destination = TrackedDestination::new(stream);

        self.send(Reply::new(ReplyCode::DataConnectionOpening)).await;
        self.set_phase(UploadPhase::Transferring);
        lease.channel().resume();

        let report = transfer::run(lease, &mut destination, self.config.buffer_size()).await;
        destination.release();

        Settled {
            server_path: Some(server_path),
            bytes: report.bytes,
            result: report.result.map(|()| client_path),
        }
    }

    async fn send(&self, reply: Reply) {
        let code = reply.code;
        if let Err(e) = self.ctx.replies.send(reply).await {
            warn!(%code, "failed to send reply: {e}");
        }
    }

    fn set_phase(&mut self, next: UploadPhase) {
        debug!(from = %self.phase, to = %next, "upload phase");
        self.phase = next;
    }
}
