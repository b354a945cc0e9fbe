use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// 패키지로 인식되는 파일 이름 접미사 (대소문자 구분)
pub const DEFAULT_PACKAGE_SUFFIX: &str = ".pkg";

/// Properties handed to the framework factory when the framework is created.
pub type FrameworkProperties = HashMap<String, String>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing package directory argument (usage: saba-launcher <packages-dir>)")]
    MissingPackagesDir,
    #[error("unexpected argument '{0}' (usage: saba-launcher <packages-dir>)")]
    UnexpectedArgument(String),
    #[error("package directory argument is empty (usage: saba-launcher <packages-dir>)")]
    EmptyPackagesDir,
}

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub packages_dir: PathBuf,
    pub package_suffix: String,
    pub framework_properties: FrameworkProperties,
}

impl LaunchConfig {
    pub fn new(packages_dir: impl Into<PathBuf>) -> Self {
        Self {
            packages_dir: packages_dir.into(),
            package_suffix: DEFAULT_PACKAGE_SUFFIX.to_string(),
            framework_properties: FrameworkProperties::new(),
        }
    }

    /// Build the config from process arguments, program name already skipped.
    /// Exactly one positional argument is accepted.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let dir = args.next().ok_or(ConfigError::MissingPackagesDir)?;
        if let Some(extra) = args.next() {
            return Err(ConfigError::UnexpectedArgument(extra));
        }
        if dir.trim().is_empty() {
            return Err(ConfigError::EmptyPackagesDir);
        }
        Ok(Self::new(dir))
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.package_suffix = suffix.to_string();
        self
    }
}
