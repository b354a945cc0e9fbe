//! Startup supervision
//!
//! Starts installed modules one by one in installation order. A failing
//! module gets its error recorded in [`StartOutcome::Failed`] and the loop
//! moves on; nothing is retried or rolled back.

use super::error::StartError;
use crate::framework::{Framework, ModuleId, PackageLocation};

#[derive(Debug)]
pub enum StartOutcome {
    Pending,
    Started,
    Failed(StartError),
}

impl StartOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Failed(_) => "failed",
        }
    }
}

/// A module known to the framework. Only the outcome changes after install.
#[derive(Debug)]
pub struct InstalledModule {
    pub id: ModuleId,
    pub location: PackageLocation,
    pub outcome: StartOutcome,
}

impl InstalledModule {
    pub fn new(id: ModuleId, location: PackageLocation) -> Self {
        Self {
            id,
            location,
            outcome: StartOutcome::Pending,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self.outcome, StartOutcome::Started)
    }

    pub fn start_error(&self) -> Option<&StartError> {
        match &self.outcome {
            StartOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "location": self.location,
            "outcome": self.outcome.as_str(),
            "error": self.start_error().map(|e| e.source.to_string()),
        })
    }
}

/// Start every module, recording each outcome. Returns the number of failures.
pub async fn start_all<F: Framework>(framework: &F, modules: &mut [InstalledModule]) -> usize {
    let mut failed = 0;
    for module in modules.iter_mut() {
        match framework.start_module(module.id).await {
            Ok(()) => {
                tracing::info!("Started module {} ({})", module.id, module.location);
                module.outcome = StartOutcome::Started;
            }
            Err(source) => {
                let err = StartError {
                    module: module.id,
                    location: module.location.clone(),
                    source,
                };
                // 다른 모듈은 계속 시작
                tracing::error!("{}", err);
                module.outcome = StartOutcome::Failed(err);
                failed += 1;
            }
        }
    }
    failed
}
