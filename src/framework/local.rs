//! In-process module framework
//!
//! Keeps an installed-module registry and a running-state watch channel.
//! Packages are treated as opaque files: install checks that the file is
//! there, start reads it and refuses an empty package.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use super::{Framework, FrameworkError, FrameworkFactory, FrameworkState, ModuleId, PackageLocation};
use crate::config::FrameworkProperties;

#[derive(Debug)]
struct LocalModule {
    location: PackageLocation,
    path: PathBuf,
    active: bool,
}

#[derive(Debug)]
struct Registry {
    next_id: u64,
    modules: HashMap<ModuleId, LocalModule>,
}

pub struct LocalFramework {
    properties: FrameworkProperties,
    registry: Mutex<Registry>,
    state_tx: watch::Sender<FrameworkState>,
}

impl LocalFramework {
    pub fn new(properties: FrameworkProperties) -> Self {
        let (state_tx, _) = watch::channel(FrameworkState::Installed);
        Self {
            properties,
            registry: Mutex::new(Registry {
                // id 0 = 프레임워크 자신
                next_id: 1,
                modules: HashMap::new(),
            }),
            state_tx,
        }
    }

    pub fn properties(&self) -> &FrameworkProperties {
        &self.properties
    }

    pub fn module_count(&self) -> usize {
        self.registry().map(|r| r.modules.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn is_module_active(&self, id: ModuleId) -> bool {
        self.registry()
            .ok()
            .and_then(|r| r.modules.get(&id).map(|m| m.active))
            .unwrap_or(false)
    }

    fn registry(&self) -> Result<MutexGuard<'_, Registry>, FrameworkError> {
        self.registry.lock().map_err(|e| {
            tracing::error!("LocalFramework registry lock poisoned: {}", e);
            FrameworkError::LockPoisoned
        })
    }

    fn require_active(&self) -> Result<(), FrameworkError> {
        if *self.state_tx.borrow() == FrameworkState::Active {
            Ok(())
        } else {
            Err(FrameworkError::NotActive)
        }
    }
}

/// `file:` URL → filesystem path; anything else is malformed.
fn package_path(location: &PackageLocation) -> Result<PathBuf, FrameworkError> {
    let malformed = || FrameworkError::MalformedLocation(location.clone());
    let url = location.to_url().map_err(|_| malformed())?;
    if url.scheme() != super::FILE_SCHEME {
        return Err(malformed());
    }
    url.to_file_path().map_err(|_| malformed())
}

async fn check_package_file(location: &PackageLocation, path: &Path) -> Result<(), FrameworkError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| FrameworkError::PackageUnreadable {
            location: location.clone(),
            source,
        })?;
    if !metadata.is_file() {
        return Err(FrameworkError::Rejected(format!(
            "'{}' is not a regular file",
            location
        )));
    }
    Ok(())
}

impl Framework for LocalFramework {
    async fn start(&self) -> Result<(), FrameworkError> {
        let mut result = Ok(());
        self.state_tx.send_modify(|state| match *state {
            FrameworkState::Installed => *state = FrameworkState::Active,
            FrameworkState::Active => {}
            FrameworkState::Stopped => result = Err(FrameworkError::AlreadyStopped),
        });
        if result.is_ok() {
            tracing::info!("Local framework active ({} properties)", self.properties.len());
            for (key, value) in self.properties() {
                tracing::debug!("  {} = {}", key, value);
            }
        }
        result
    }

    async fn install(&self, location: &PackageLocation) -> Result<ModuleId, FrameworkError> {
        self.require_active()?;
        let path = package_path(location)?;

        let duplicate = self.registry()?.modules.values().any(|m| &m.location == location);
        if duplicate {
            return Err(FrameworkError::DuplicateLocation(location.clone()));
        }
        check_package_file(location, &path).await?;

        let mut registry = self.registry()?;
        // 검사 중 같은 위치가 설치됐을 수 있으므로 다시 확인
        if registry.modules.values().any(|m| &m.location == location) {
            return Err(FrameworkError::DuplicateLocation(location.clone()));
        }
        let id = ModuleId(registry.next_id);
        registry.next_id += 1;
        registry.modules.insert(
            id,
            LocalModule {
                location: location.clone(),
                path,
                active: false,
            },
        );
        tracing::debug!("Installed module {} from {}", id, location);
        Ok(id)
    }

    async fn start_module(&self, id: ModuleId) -> Result<(), FrameworkError> {
        self.require_active()?;
        let (location, path) = {
            let registry = self.registry()?;
            let module = registry
                .modules
                .get(&id)
                .ok_or(FrameworkError::UnknownModule(id))?;
            if module.active {
                return Ok(());
            }
            (module.location.clone(), module.path.clone())
        };

        check_package_file(&location, &path).await?;
        let payload = tokio::fs::read(&path)
            .await
            .map_err(|source| FrameworkError::PackageUnreadable {
                location: location.clone(),
                source,
            })?;
        if payload.is_empty() {
            return Err(FrameworkError::Rejected(format!(
                "'{}' is empty, nothing to start",
                location
            )));
        }

        if let Some(module) = self.registry()?.modules.get_mut(&id) {
            module.active = true;
        }
        tracing::debug!("Module {} active", id);
        Ok(())
    }

    async fn stop(&self) -> Result<(), FrameworkError> {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == FrameworkState::Stopped {
                false
            } else {
                *state = FrameworkState::Stopped;
                true
            }
        });
        if changed {
            if let Ok(mut registry) = self.registry() {
                for module in registry.modules.values_mut() {
                    module.active = false;
                }
            }
            tracing::info!("Local framework stopped ({} modules installed)", self.module_count());
        }
        Ok(())
    }

    async fn wait_for_stop(&self) -> Result<(), FrameworkError> {
        let mut rx = self.state_tx.subscribe();
        rx.wait_for(|state| *state == FrameworkState::Stopped)
            .await
            .map(|_| ())
            .map_err(|_| FrameworkError::WaitInterrupted)
    }

    fn state(&self) -> FrameworkState {
        *self.state_tx.borrow()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFrameworkFactory;

impl FrameworkFactory for LocalFrameworkFactory {
    type Framework = LocalFramework;

    fn new_framework(&self, properties: &FrameworkProperties) -> Result<LocalFramework, FrameworkError> {
        Ok(LocalFramework::new(properties.clone()))
    }
}
