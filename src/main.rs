use saba_launcher::config::LaunchConfig;
use saba_launcher::framework::LocalFrameworkFactory;
use saba_launcher::supervisor::shutdown::{action_for_signal, SignalAction, FORCE_EXIT_CODE};
use saba_launcher::supervisor::{self, BootstrapError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match LaunchConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => fail(BootstrapError::from(e)),
    };
    tracing::info!("Launcher starting (packages: {})", config.packages_dir.display());

    // Ctrl+C / SIGTERM 수신 시 프레임워크 정지 요청, 두 번째 신호는 강제 종료
    let cancel = CancellationToken::new();
    match ShutdownSignals::register() {
        Ok(signals) => {
            tokio::spawn(listen_for_shutdown(signals, cancel.clone()));
        }
        Err(e) => tracing::warn!("Cannot listen for shutdown signals: {}", e),
    }

    match supervisor::launch(&LocalFrameworkFactory, &config, cancel).await {
        Ok(report) => {
            tracing::info!("Start report: {}", report.to_json());
            tracing::info!(
                "Launcher stopped ({} started, {} failed)",
                report.started(),
                report.failed()
            );
            Ok(())
        }
        Err(e) => fail(e),
    }
}

fn fail(err: BootstrapError) -> ! {
    tracing::error!("{} [{}]", err, err.error_code());
    eprintln!("saba-launcher: {}", err);
    println!("{}", err.to_json());
    std::process::exit(err.exit_code())
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> Option<()> {
        tokio::select! {
            res = self.interrupt.recv() => res,
            res = self.terminate.recv() => res,
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<()> {
        tokio::signal::ctrl_c().await.ok()
    }
}

async fn listen_for_shutdown(mut signals: ShutdownSignals, cancel: CancellationToken) {
    let mut received = 0;
    while signals.recv().await.is_some() {
        received += 1;
        match action_for_signal(received) {
            SignalAction::Graceful => {
                tracing::info!("Shutdown signal received");
                cancel.cancel();
            }
            SignalAction::ForceExit => {
                tracing::warn!("Second shutdown signal, exiting without waiting");
                std::process::exit(FORCE_EXIT_CODE);
            }
        }
    }
}
