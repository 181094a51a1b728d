use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{self, Receiver, Sender};

/// Signals every virtual user, and the background threads supporting them, that the run is over.
///
/// The signal is sticky. Listeners created after [ShutdownHandle::shutdown] was called still
/// observe it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(1).0,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            log::trace!("Shutdown already requested");
            return;
        }

        if let Err(e) = self.sender.send(()) {
            // Fails if nobody is currently waiting, the flag still reaches later listeners.
            log::debug!("No active listeners for shutdown signal: {e:?}");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe(), self.triggered.clone())
    }
}

#[derive(Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<()>,
    triggered: Arc<AtomicBool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>, triggered: Arc<AtomicBool>) -> Self {
        Self {
            receiver,
            triggered,
        }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then
    /// work should be stopped so that the run can finish.
    pub fn should_shutdown(&mut self) -> bool {
        if self.triggered.load(Ordering::SeqCst) {
            return true;
        }

        match self.receiver.try_recv() {
            Ok(_) | Err(TryRecvError::Closed) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Lagged(_)) => false,
        }
    }

    /// Wait until the shutdown signal is received. It is safe to race this with another future
    /// so that the shutdown signal can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        loop {
            if self.triggered.load(Ordering::SeqCst) {
                return;
            }

            match self.receiver.recv().await {
                Ok(_) | Err(RecvError::Closed) => return,
                Err(RecvError::Lagged(_)) => continue,
            }
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}
