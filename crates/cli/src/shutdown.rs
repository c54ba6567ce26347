use engine_runtime::execution::report::ExtractionStatus;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Listens for SIGINT and SIGTERM and cancels the extraction token so
/// runners stop between records and the upload queue can do its final flush.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the signal listener. The first SIGINT or SIGTERM cancels the token.
    pub fn register_handlers(&self) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let received = wait_for_signal().await;
            info!(signal = received, "Shutdown requested, letting runners stop and flushing uploads");
            coordinator.request_shutdown();
        });
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

async fn wait_for_signal() -> &'static str {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Exit codes for the CLI application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// 128 + SIGINT
    ShutdownRequested = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExtractionStatus> for ExitCode {
    fn from(status: ExtractionStatus) -> Self {
        match status {
            ExtractionStatus::Succeeded => ExitCode::Success,
            ExtractionStatus::Failed => ExitCode::GeneralError,
            ExtractionStatus::Cancelled => ExitCode::ShutdownRequested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extraction_status_to_exit_code() {
        assert_eq!(ExitCode::from(ExtractionStatus::Succeeded).as_i32(), 0);
        assert_eq!(ExitCode::from(ExtractionStatus::Failed).as_i32(), 1);
        assert_eq!(ExitCode::from(ExtractionStatus::Cancelled).as_i32(), 130);
    }

    #[test]
    fn request_cancels_the_shared_token() {
        let token = CancellationToken::new();
        let coordinator = ShutdownCoordinator::new(token.clone());
        assert!(!coordinator.is_shutdown_requested());

        coordinator.clone().request_shutdown();
        assert!(coordinator.is_shutdown_requested());
        assert!(token.is_cancelled());
    }
}
