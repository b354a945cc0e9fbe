use super::error::InstallError;
use super::module_loader::DiscoveredPackages;
use super::startup::InstalledModule;
use crate::framework::{Framework, PackageLocation};

/// Install one package. No retry.
pub async fn install_package<F: Framework>(
    framework: &F,
    location: &PackageLocation,
    installed_before: usize,
) -> Result<InstalledModule, InstallError> {
    let id = framework
        .install(location)
        .await
        .map_err(|source| InstallError {
            location: location.clone(),
            installed_before,
            source,
        })?;
    tracing::info!("Installed {} as module {}", location, id);
    Ok(InstalledModule::new(id, location.clone()))
}

/// Install every discovered package in discovery order.
///
/// Stops at the first failure; the caller must not start anything in that case.
pub async fn install_all<F: Framework>(
    framework: &F,
    packages: &DiscoveredPackages,
) -> Result<Vec<InstalledModule>, InstallError> {
    let mut modules = Vec::with_capacity(packages.len());
    for location in packages {
        let module = install_package(framework, location, modules.len()).await?;
        modules.push(module);
    }
    Ok(modules)
}
