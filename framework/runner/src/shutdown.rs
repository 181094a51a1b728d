use tokio::signal;

pub(crate) use journey_tunnel_core::prelude::{
    DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError,
};

/// Listen for Ctrl-C and turn it into a shutdown signal for every virtual user.
pub(crate) fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => {
                log::warn!("Unable to listen for Ctrl-C, the run can only end on its own: {e:?}");
            }
        }
    });

    Ok(handle)
}
