//! Wires the upload core to stdout, a passive listener and a directory.

use std::sync::Arc;

use anyhow::Context;
use ftpd_data_channel::TcpDataChannel;
use ftpd_protocol::TransferMode;
use ftpd_storage::FsBackend;
use ftpd_upload::{
    ChannelEventSink, ControlWriter, IntakeGate, TransferEvent, TransferOutcome, UploadContext,
    UploadOrchestrator,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Receives one upload. Replies go to stdout; events are logged as JSON.
pub async fn run(
    config: Config,
    mode: TransferMode,
    path: String,
    rest: u64,
) -> anyhow::Result<TransferOutcome> {
    let cancel = CancellationToken::new();

    let mut channel = TcpDataChannel::bind_passive(config.data_addr, cancel.clone())
        .await
        .context("binding passive data listener")?;
    let addr = channel
        .local_addr()
        .context("passive listener has no local address")?;
    tracing::info!(%addr, root = %config.root.display(), "waiting for data connection");

    // -- Events --
    let (tx, mut rx) = mpsc::channel::<TransferEvent>(16);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(event = %json, "transfer event"),
                Err(e) => tracing::warn!("failed to encode transfer event: {e}"),
            }
        }
    });

    // -- Interrupt --
    let signal = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling");
                cancel.cancel();
            }
        })
    };

    let ctx = UploadContext::new(
        Arc::new(ControlWriter::new(tokio::io::stdout())),
        Arc::new(IntakeGate::new()),
        Arc::new(ChannelEventSink::new(tx)),
    )
    .with_storage(Arc::new(FsBackend::new(&config.root)));

    let mut orchestrator = UploadOrchestrator::new(ctx, config.upload.clone());
    orchestrator.set_restart_offset(rest);
    let request = orchestrator.request(path, mode);
    let outcome = orchestrator.execute(request, &mut channel).await;

    signal.abort();
    // Dropping the orchestrator closes the event channel.
    drop(orchestrator);
    printer.await.context("event printer panicked")?;

    Ok(outcome)
}
