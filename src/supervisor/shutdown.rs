use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::WaitError;
use crate::framework::Framework;

/// Exit status used when a second shutdown signal arrives before the
/// graceful stop has finished.
pub const FORCE_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Cancel the run and let the framework stop
    Graceful,
    /// Leave immediately without waiting for the framework
    ForceExit,
}

/// `received` counts signals so far, including the current one.
pub fn action_for_signal(received: usize) -> SignalAction {
    if received <= 1 {
        SignalAction::Graceful
    } else {
        SignalAction::ForceExit
    }
}

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownTrigger {
    /// Something else (an operator, a module) stopped the framework
    Framework,
    /// The launcher's own token was cancelled (Ctrl+C / SIGTERM)
    Cancelled,
}

/// Block until the framework stops, with no timeout.
///
/// Cancelling `cancel` asks the framework to stop and then keeps waiting for
/// that stop to complete, so both paths end with a stopped framework.
pub async fn wait_for_shutdown<F: Framework>(
    framework: &F,
    cancel: &CancellationToken,
) -> Result<ShutdownTrigger, WaitError> {
    tokio::select! {
        res = framework.wait_for_stop() => {
            res?;
            tracing::info!("Framework stopped");
            Ok(ShutdownTrigger::Framework)
        }
        _ = cancel.cancelled() => {
            tracing::info!("Shutdown requested, stopping framework");
            framework.stop().await?;
            framework.wait_for_stop().await?;
            Ok(ShutdownTrigger::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_signal_forces_exit() {
        assert_eq!(action_for_signal(1), SignalAction::Graceful);
        assert_eq!(action_for_signal(2), SignalAction::ForceExit);
        assert_eq!(action_for_signal(5), SignalAction::ForceExit);
        assert_ne!(FORCE_EXIT_CODE, 0);
    }
}
