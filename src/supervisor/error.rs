//! Bootstrap 에러 타입 — 치명적 에러(프로세스 종료)와 모듈 단위 시작 실패를
//! 구분합니다. `StartError`는 `BootstrapError`로 변환되지 않습니다.

use std::path::PathBuf;
use thiserror::Error;

use super::state_machine::TransitionError;
use crate::config::ConfigError;
use crate::framework::{FrameworkError, ModuleId, PackageLocation};

/// Package directory could not be listed.
#[derive(Error, Debug)]
#[error("cannot read package directory '{}': {source}", .path.display())]
pub struct DiscoveryError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The framework refused a package. Fatal: no module is started afterwards.
#[derive(Error, Debug)]
#[error("failed to install '{location}' ({installed_before} already installed, not started): {source}")]
pub struct InstallError {
    pub location: PackageLocation,
    /// Modules installed before this one; they stay installed but never start.
    pub installed_before: usize,
    #[source]
    pub source: FrameworkError,
}

/// A single module failed to start. Recorded on the module, never propagated.
#[derive(Error, Debug)]
#[error("module {module} ({location}) failed to start: {source}")]
pub struct StartError {
    pub module: ModuleId,
    pub location: PackageLocation,
    #[source]
    pub source: FrameworkError,
}

#[derive(Error, Debug)]
#[error("waiting for framework stop failed: {source}")]
pub struct WaitError {
    #[from]
    pub source: FrameworkError,
}

/// Errors that end the launcher run with a non-zero exit status
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("invalid arguments: {0}")]
    Config(#[from] ConfigError),

    #[error("framework failed to start: {0}")]
    FrameworkStart(#[source] FrameworkError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("internal state error: {0}")]
    State(#[from] TransitionError),
}

impl BootstrapError {
    /// 프로세스 종료 코드 매핑
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::State(_) => 1,
            Self::Config(_) => 2,
            Self::FrameworkStart(_) => 3,
            Self::Discovery(_) => 4,
            Self::Install(_) => 5,
            Self::Wait(_) => 6,
        }
    }

    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::State(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::FrameworkStart(_) => "FRAMEWORK_START_ERROR",
            Self::Discovery(_) => "DISCOVERY_ERROR",
            Self::Install(_) => "INSTALL_ERROR",
            Self::Wait(_) => "WAIT_ERROR",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
            "exit_code": self.exit_code(),
        })
    }
}
