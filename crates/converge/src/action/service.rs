//! OpenRC service actions: runlevel registration plus start/stop.

use super::require_nonempty;
use crate::error::Result;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEnable {
    pub service: String,
    pub runlevel: String,
}

impl ServiceEnable {
    pub fn description(&self) -> String {
        format!("Enable and start service {} in runlevel {}", self.service, self.runlevel)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![
            format!("run: rc-update add {} {}", self.service, self.runlevel),
            format!("run: rc-service {} start", self.service),
        ]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.service, "service name")?;
        require_nonempty(&self.runlevel, "runlevel")?;
        log::info!("Enabling and starting service {} in runlevel {}", self.service, self.runlevel);
        host.runner
            .run("", &format!("rc-update add {} {}", self.service, self.runlevel))?;
        host.runner
            .run("", &format!("rc-service {} start", self.service))?;
        Ok(())
    }

    /// Both steps are attempted even if the first fails; the last error
    /// wins.
    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Stopping and disabling service {} during rollback", self.service);
        let mut result = Ok(());
        if let Err(e) = host.runner.run("", &format!("rc-service {} stop", self.service)) {
            log::error!("Failed to stop service {} during rollback: {e}", self.service);
            result = Err(e);
        }
        if let Err(e) = host
            .runner
            .run("", &format!("rc-update del {} {}", self.service, self.runlevel))
        {
            log::error!("Failed to disable service {} during rollback: {e}", self.service);
            result = Err(e);
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDisable {
    pub service: String,
    pub runlevel: String,
}

impl ServiceDisable {
    pub fn description(&self) -> String {
        format!("Stop and disable service {} in runlevel {}", self.service, self.runlevel)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![
            format!("run: rc-service {} stop", self.service),
            format!("run: rc-update del {} {}", self.service, self.runlevel),
        ]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.service, "service name")?;
        require_nonempty(&self.runlevel, "runlevel")?;
        log::info!("Stopping and disabling service {} in runlevel {}", self.service, self.runlevel);
        host.runner
            .run("", &format!("rc-service {} stop", self.service))?;
        host.runner
            .run("", &format!("rc-update del {} {}", self.service, self.runlevel))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Enabling and starting service {} during rollback", self.service);
        let mut result = Ok(());
        if let Err(e) = host
            .runner
            .run("", &format!("rc-update add {} {}", self.service, self.runlevel))
        {
            log::error!("Failed to enable service {} during rollback: {e}", self.service);
            result = Err(e);
        }
        if let Err(e) = host.runner.run("", &format!("rc-service {} start", self.service)) {
            log::error!("Failed to start service {} during rollback: {e}", self.service);
            result = Err(e);
        }
        result
    }
}
