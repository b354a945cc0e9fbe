//! Bootstrap supervisor
//!
//! Brings a framework and its initial modules up, then blocks until the
//! framework stops:
//!
//! ```text
//! NOT_STARTED → FRAMEWORK_STARTED → DISCOVERED → INSTALLED → SUPERVISING → WAITING → STOPPED
//! ```
//!
//! Discovery, install and wait failures are fatal. Module start failures are
//! recorded per module and the run continues to WAITING.

pub mod error;
pub mod installer;
pub mod module_loader;
pub mod shutdown;
pub mod startup;
pub mod state_machine;

use tokio_util::sync::CancellationToken;

use crate::config::LaunchConfig;
use crate::framework::{Framework, FrameworkFactory};
pub use error::{BootstrapError, DiscoveryError, InstallError, StartError, WaitError};
use module_loader::{ModuleLoader, PackageFilter};
pub use shutdown::ShutdownTrigger;
pub use startup::{InstalledModule, StartOutcome};
pub use state_machine::{BootstrapState, StateMachine};

/// Result of a completed run
#[derive(Debug)]
pub struct BootstrapReport {
    pub modules: Vec<InstalledModule>,
    pub final_state: BootstrapState,
    pub trigger: ShutdownTrigger,
}

impl BootstrapReport {
    pub fn started(&self) -> usize {
        self.modules.iter().filter(|m| m.is_started()).count()
    }

    pub fn failed(&self) -> usize {
        self.modules.iter().filter(|m| m.start_error().is_some()).count()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.final_state,
            "trigger": self.trigger,
            "total": self.modules.len(),
            "started": self.started(),
            "failed": self.failed(),
            "modules": self.modules.iter().map(InstalledModule::to_json).collect::<Vec<_>>(),
        })
    }
}

pub struct Bootstrap<F: Framework> {
    framework: F,
    module_loader: ModuleLoader,
    machine: StateMachine,
    modules: Vec<InstalledModule>,
}

impl<F: Framework> Bootstrap<F> {
    pub fn new(framework: F, config: &LaunchConfig) -> Self {
        Self {
            framework,
            module_loader: ModuleLoader::new(
                &config.packages_dir,
                PackageFilter::new(&config.package_suffix),
            ),
            machine: StateMachine::new(),
            modules: Vec::new(),
        }
    }

    /// Run the whole sequence. Returns only after the framework has stopped
    /// or a fatal error occurred.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<BootstrapReport, BootstrapError> {
        if let Err(e) = self.bring_up().await {
            tracing::error!("Bootstrap aborted in state {:?}: {}", self.machine.state, e);
            match &e {
                BootstrapError::Install(install) => {
                    tracing::warn!(
                        "{} modules were installed before the failure and will not be started",
                        install.installed_before
                    );
                    self.abort_cleanup().await;
                }
                BootstrapError::Discovery(_) => self.abort_cleanup().await,
                _ => {}
            }
            return Err(e);
        }

        self.machine.transition(BootstrapState::Waiting)?;
        let trigger = shutdown::wait_for_shutdown(&self.framework, &cancel).await?;
        self.machine.transition(BootstrapState::Stopped)?;

        Ok(BootstrapReport {
            modules: self.modules,
            final_state: self.machine.state,
            trigger,
        })
    }

    /// Framework start through supervision; stops in SUPERVISING.
    async fn bring_up(&mut self) -> Result<(), BootstrapError> {
        self.framework
            .start()
            .await
            .map_err(BootstrapError::FrameworkStart)?;
        self.machine.transition(BootstrapState::FrameworkStarted)?;

        tracing::info!(
            "Scanning {} for packages",
            self.module_loader.packages_dir().display()
        );
        let packages = self.module_loader.discover_packages()?;
        tracing::info!("Discovered {} packages", packages.len());
        self.machine.transition(BootstrapState::Discovered)?;

        self.modules = installer::install_all(&self.framework, &packages).await?;
        self.machine.transition(BootstrapState::Installed)?;

        self.machine.transition(BootstrapState::Supervising)?;
        let failed = startup::start_all(&self.framework, &mut self.modules).await;
        if failed > 0 {
            tracing::warn!(
                "{} of {} modules failed to start",
                failed,
                self.modules.len()
            );
        } else {
            tracing::info!("All {} modules started", self.modules.len());
        }
        Ok(())
    }

    /// Best-effort stop after a fatal error. Does not wait.
    async fn abort_cleanup(&self) {
        if let Err(e) = self.framework.stop().await {
            tracing::warn!("Failed to stop framework during cleanup: {}", e);
        }
    }
}

/// Create a framework from `factory` and run the bootstrap against it.
pub async fn launch<Fa: FrameworkFactory>(
    factory: &Fa,
    config: &LaunchConfig,
    cancel: CancellationToken,
) -> Result<BootstrapReport, BootstrapError> {
    let framework = factory
        .new_framework(&config.framework_properties)
        .map_err(BootstrapError::FrameworkStart)?;
    Bootstrap::new(framework, config).run(cancel).await
}
