use tokio::signal;
use tokio::sync::watch;

/// Resolves on Ctrl+C or SIGTERM and tells background grading tasks to stop.
///
/// Dropping `notify` without a signal also releases the receivers, so workers exit
/// whenever the server future ends.
pub(crate) async fn shutdown_signal(notify: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received; stopping grading workers");
    if notify.send(true).is_err() {
        tracing::warn!("No grading tasks were listening for shutdown");
    }
}
