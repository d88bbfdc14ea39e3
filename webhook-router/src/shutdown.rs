//! Process shutdown signals: Ctrl-C, and SIGTERM on Unix.

use std::io;
use thiserror::Error;
use tokio::signal;

#[derive(Debug, Error)]
pub enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(#[source] io::Error),

    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    SigTerm(#[source] io::Error),
}

/// Installed signal handlers. Handlers are registered in [`ShutdownSignal::install`],
/// so a signal arriving before [`ShutdownSignal::recv`] is polled is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl ShutdownSignal {
    pub fn install() -> Result<Self, ShutdownSignalError> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal::unix::signal(signal::unix::SignalKind::terminate())
                .map_err(ShutdownSignalError::SigTerm)?,
        })
    }

    /// Resolves once either signal is received.
    pub async fn recv(self) -> Result<(), ShutdownSignalError> {
        let ctrl_c = async {
            signal::ctrl_c().await.map_err(ShutdownSignalError::CtrlC)
        };

        #[cfg(unix)]
        let terminate = {
            let mut terminate = self.terminate;
            async move {
                terminate.recv().await;
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = ctrl_c => {
                result?;
                tracing::info!("ctrl_c signal received");
            }
            _ = terminate => {
                tracing::info!("terminate signal received");
            }
        }
        Ok(())
    }
}
