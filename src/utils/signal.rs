use tokio::signal;

use crate::error::log_error;

/// Resolves on Ctrl+C. If the handler cannot be installed the server keeps running.
pub async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        log_error(&e);
        std::future::pending::<()>().await;
    }

    #[cfg(not(windows))]
    println!();
    tracing::info!("Ctrl+C received. Please wait, this could take a while.");
}
