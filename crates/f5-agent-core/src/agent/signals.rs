//! Termination and reconfiguration requests
//!
//! Signal handlers only set flags. The agent loop reads them at the top of
//! each iteration, so nothing runs reentrantly in the middle of a cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Default)]
struct LatchState {
    terminate: AtomicBool,
    reconfigure: AtomicBool,
    wake: Notify,
}

/// Flags set by signals and consumed by the agent loop
///
/// Clones share the same flags.
#[derive(Debug, Clone, Default)]
pub struct SignalLatch {
    state: Arc<LatchState>,
}

impl SignalLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the agent to drain and stop after the current cycle
    pub fn request_terminate(&self) {
        self.state.terminate.store(true, Ordering::SeqCst);
        self.state.wake.notify_waiters();
    }

    /// Ask the agent to reload its configuration between cycles
    pub fn request_reconfigure(&self) {
        self.state.reconfigure.store(true, Ordering::SeqCst);
        self.state.wake.notify_waiters();
    }

    pub fn is_terminating(&self) -> bool {
        self.state.terminate.load(Ordering::SeqCst)
    }

    /// Consume a pending reconfiguration request
    pub fn take_reconfigure(&self) -> bool {
        self.state.reconfigure.swap(false, Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early when a request arrives
    ///
    /// Requests never leave a stored wakeup behind, so a request handled
    /// between sleeps does not cut the next one short.
    pub async fn sleep(&self, duration: Duration) {
        let notified = self.state.wake.notified();
        tokio::pin!(notified);
        // Register before checking the flags so a request in between is seen
        notified.as_mut().enable();

        if self.is_terminating() || self.state.reconfigure.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }

    /// Install OS signal handlers feeding this latch
    ///
    /// SIGTERM and SIGINT request termination, SIGHUP a reconfiguration.
    /// Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn listen_os(&self) -> std::io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let latch = self.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Caught SIGTERM, quitting daemon loop");
                        latch.request_terminate();
                    }
                    _ = sigint.recv() => {
                        info!("Caught SIGINT, quitting daemon loop");
                        latch.request_terminate();
                    }
                    _ = sighup.recv() => {
                        info!("Caught SIGHUP, reloading configuration");
                        latch.request_reconfigure();
                    }
                }
            }
        }))
    }

    /// Install OS signal handlers feeding this latch
    ///
    /// Only Ctrl-C is available here; it requests termination.
    #[cfg(not(unix))]
    pub fn listen_os(&self) -> std::io::Result<JoinHandle<()>> {
        let latch = self.clone();
        Ok(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                info!("Caught Ctrl-C, quitting daemon loop");
                latch.request_terminate();
            }
        }))
    }
}
