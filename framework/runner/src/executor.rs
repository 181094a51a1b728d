use std::future::Future;

use crate::shutdown::{ShutdownHandle, ShutdownSignalError};

/// Bridges the synchronous virtual user threads and the shared async runtime.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    /// Normally created by [crate::run::run], constructing one directly is useful when driving
    /// behaviour code outside of a full run, such as in tests.
    pub fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the runner is shutdown, in which case a
    /// [ShutdownSignalError] is returned. Submitting a future which does not support cancelling
    /// may prevent the runner from shutting down.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// The future is not cancelled when the runner shuts down and the runner does not wait for it.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Run async code in place, blocking until it completes, even if the runner is shutting down.
    ///
    /// Only use this for short, bounded work that must happen once per behaviour run, such as
    /// reporting that a journey has finished.
    pub fn execute_to_completion<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(fut)
    }
}
