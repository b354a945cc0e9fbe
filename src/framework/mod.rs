//! Module framework capability interface
//!
//! The launcher only drives the framework through this narrow lifecycle
//! surface. Dependency resolution, service registry and isolation belong to
//! whichever host implements [`Framework`].
//!
//! - [`LocalFramework`]: in-process host used by the `saba-launcher` binary
//! - test hosts: any type implementing [`Framework`] (see `tests/`)

pub mod local;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::FrameworkProperties;

pub use local::{LocalFramework, LocalFrameworkFactory};

const FILE_SCHEME: &str = "file";

/// Framework-assigned module identity. `0` is reserved for the framework itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Addressable reference to one module package, a `file:` URL for packages
/// found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageLocation(String);

impl PackageLocation {
    /// Wrap an already formatted location string without validating it.
    /// Malformed locations are rejected at install time.
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Convert a filesystem path to a percent-encoded `file:` URL.
    /// Relative paths are resolved against the current directory; `None` if
    /// the path still cannot be expressed as a URL.
    pub fn from_path(path: &Path) -> Option<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(path)
        };
        Url::from_file_path(&absolute).ok().map(|url| Self(url.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.0)
    }

    /// Filesystem path behind a `file:` location, `None` for anything else.
    pub fn to_path(&self) -> Option<PathBuf> {
        let url = self.to_url().ok()?;
        if url.scheme() != FILE_SCHEME {
            return None;
        }
        url.to_file_path().ok()
    }

    /// Decoded last path segment.
    pub fn file_name(&self) -> Option<String> {
        if let Some(path) = self.to_path() {
            return path.file_name().map(|name| name.to_string_lossy().into_owned());
        }
        let url = self.to_url().ok()?;
        url.path_segments()?
            .last()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
    }
}

impl fmt::Display for PackageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkState {
    /// Created, not running yet
    Installed,
    Active,
    Stopped,
}

#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error("framework is not active")]
    NotActive,
    #[error("framework already stopped")]
    AlreadyStopped,
    #[error("malformed package location '{0}'")]
    MalformedLocation(PackageLocation),
    #[error("package '{0}' is already installed")]
    DuplicateLocation(PackageLocation),
    #[error("package '{location}' is unreadable: {source}")]
    PackageUnreadable {
        location: PackageLocation,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown module {0}")]
    UnknownModule(ModuleId),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("wait for stop was interrupted")]
    WaitInterrupted,
    #[error("framework lock poisoned")]
    LockPoisoned,
}

/// Creates framework instances; one per launcher run.
pub trait FrameworkFactory {
    type Framework: Framework;

    fn new_framework(&self, properties: &FrameworkProperties) -> Result<Self::Framework, FrameworkError>;
}

/// Lifecycle operations the launcher needs from a module framework.
///
/// Every call is awaited to completion before the next one is issued; the
/// launcher never runs two of them concurrently except `stop` racing
/// `wait_for_stop`.
pub trait Framework: Send + Sync {
    fn start(&self) -> impl Future<Output = Result<(), FrameworkError>> + Send;

    fn install(
        &self,
        location: &PackageLocation,
    ) -> impl Future<Output = Result<ModuleId, FrameworkError>> + Send;

    /// Start one installed module. A failure here leaves the framework usable.
    fn start_module(&self, id: ModuleId) -> impl Future<Output = Result<(), FrameworkError>> + Send;

    /// Request the framework to stop. Idempotent.
    fn stop(&self) -> impl Future<Output = Result<(), FrameworkError>> + Send;

    /// Block until the framework has stopped. No timeout.
    fn wait_for_stop(&self) -> impl Future<Output = Result<(), FrameworkError>> + Send;

    fn state(&self) -> FrameworkState;
}
