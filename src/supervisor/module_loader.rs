use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::DiscoveryError;
use crate::config::DEFAULT_PACKAGE_SUFFIX;
use crate::framework::PackageLocation;

/// Name-based package filter. Case-sensitive suffix match, nothing else is read.
#[derive(Debug, Clone)]
pub struct PackageFilter {
    suffix: String,
}

impl PackageFilter {
    pub fn new(suffix: &str) -> Self {
        Self { suffix: suffix.to_string() }
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.suffix)
    }
}

impl Default for PackageFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE_SUFFIX)
    }
}

/// Discovered package locations, sorted by file name.
/// Iterating is restartable; call `discover_packages` again for a fresh listing.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredPackages {
    locations: Vec<PackageLocation>,
}

impl DiscoveredPackages {
    pub fn iter(&self) -> std::slice::Iter<'_, PackageLocation> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl<'a> IntoIterator for &'a DiscoveredPackages {
    type Item = &'a PackageLocation;
    type IntoIter = std::slice::Iter<'a, PackageLocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ModuleLoader {
    packages_dir: PathBuf,
    filter: PackageFilter,
}

impl ModuleLoader {
    pub fn new(packages_dir: &Path, filter: PackageFilter) -> Self {
        Self {
            packages_dir: packages_dir.to_path_buf(),
            filter,
        }
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    /// 패키지 디렉터리를 읽어 접미사가 일치하는 일반 파일만 이름순으로 반환
    ///
    /// Directory listing order is platform dependent, so the result is always
    /// sorted by file name. A missing or unreadable directory is an error;
    /// non-matching entries and subdirectories are skipped.
    pub fn discover_packages(&self) -> Result<DiscoveredPackages, DiscoveryError> {
        let to_error = |source| DiscoveryError {
            path: self.packages_dir.clone(),
            source,
        };

        let mut found: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.packages_dir).map_err(to_error)? {
            let entry = entry.map_err(to_error)?;
            let path = entry.path();

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::debug!("Skipping non UTF-8 entry: {:?}", raw);
                    continue;
                }
            };
            if !self.filter.accepts(&name) {
                tracing::trace!("Skipping {}", path.display());
                continue;
            }
            // 심볼릭 링크는 따라가서 판정
            if !path.is_file() {
                tracing::debug!("Skipping {} (not a regular file)", path.display());
                continue;
            }
            found.push((name, path));
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut locations = Vec::with_capacity(found.len());
        for (name, path) in &found {
            let location = PackageLocation::from_path(path).ok_or_else(|| {
                to_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' cannot be expressed as a file URL", path.display()),
                ))
            })?;
            tracing::info!("Discovered package {} at {}", name, location);
            locations.push(location);
        }

        Ok(DiscoveredPackages { locations })
    }
}
