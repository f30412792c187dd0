//! System package actions, shelling out to apk.

use super::require_nonempty;
use crate::error::Result;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstall {
    pub package: String,
}

impl PackageInstall {
    pub fn description(&self) -> String {
        format!("Install package {}", self.package)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: apk add {}", self.package)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.package, "package name")?;
        log::info!("Installing package {}", self.package);
        host.runner.run("", &format!("apk add {}", self.package))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back install of package {}", self.package);
        host.runner
            .run("", &format!("apk del {}", self.package))
            .map(|_| ())
            .inspect_err(|e| {
                log::error!("Failed to roll back install of package {}: {e}", self.package)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRemove {
    pub package: String,
}

impl PackageRemove {
    pub fn description(&self) -> String {
        format!("Remove package {}", self.package)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: apk del {}", self.package)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.package, "package name")?;
        log::info!("Removing package {}", self.package);
        host.runner.run("", &format!("apk del {}", self.package))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back removal of package {}", self.package);
        host.runner
            .run("", &format!("apk add {}", self.package))
            .map(|_| ())
            .inspect_err(|e| {
                log::error!("Failed to roll back removal of package {}: {e}", self.package)
            })
    }
}
