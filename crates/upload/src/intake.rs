//! Control-connection intake gate.

use tokio::sync::watch;

/// Pauses and resumes reading commands from the control connection.
///
/// While an upload owns the data connection, the session must not pick up
/// the next command; the orchestrator pauses intake before any data flows
/// and resumes it exactly once when the upload ends.
pub trait ControlIntake: Send + Sync {
    fn pause(&self);
    fn resume(&self);
}

/// A [`ControlIntake`] backed by a watch channel. The command reader awaits
/// [`wait_open`](Self::wait_open) before reading the next command.
#[derive(Debug)]
pub struct IntakeGate {
    paused: watch::Sender<bool>,
}

impl Default for IntakeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeGate {
    /// A gate that starts open.
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self { paused }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Resolves once intake is not paused.
    pub async fn wait_open(&self) {
        let mut rx = self.paused.subscribe();
        rx.wait_for(|paused| !*paused).await.ok();
    }
}

impl ControlIntake for IntakeGate {
    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }
}
