//! Local account and group actions via the busybox user tools.

use super::require_nonempty;
use crate::error::Result;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreate {
    pub user: String,
}

impl UserCreate {
    pub fn description(&self) -> String {
        format!("Create user {}", self.user)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: adduser -D {}", self.user)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.user, "username")?;
        log::info!("Creating user {}", self.user);
        host.runner.run("", &format!("adduser -D {}", self.user))?;
        log::warn!(
            "User {} created without password; set one with 'chpasswd {}' if login access is needed",
            self.user,
            self.user
        );
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back creation of user {}", self.user);
        host.runner
            .run("", &format!("deluser {}", self.user))
            .map(|_| ())
            .inspect_err(|e| log::error!("Failed to roll back creation of user {}: {e}", self.user))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRemove {
    pub user: String,
}

impl UserRemove {
    pub fn description(&self) -> String {
        format!("Remove user {}", self.user)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: deluser {}", self.user)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.user, "username")?;
        log::info!("Removing user {}", self.user);
        host.runner.run("", &format!("deluser {}", self.user))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back removal of user {}", self.user);
        host.runner
            .run("", &format!("adduser -D {}", self.user))
            .map(|_| ())
            .inspect_err(|e| log::error!("Failed to roll back removal of user {}: {e}", self.user))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCreate {
    pub group: String,
}

impl GroupCreate {
    pub fn description(&self) -> String {
        format!("Create group {}", self.group)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: addgroup {}", self.group)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.group, "group name")?;
        log::info!("Creating group {}", self.group);
        host.runner.run("", &format!("addgroup {}", self.group))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back creation of group {}", self.group);
        host.runner
            .run("", &format!("delgroup {}", self.group))
            .map(|_| ())
            .inspect_err(|e| log::error!("Failed to roll back creation of group {}: {e}", self.group))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUserToGroup {
    pub user: String,
    pub group: String,
}

impl AddUserToGroup {
    pub fn description(&self) -> String {
        format!("Add user {} to group {}", self.user, self.group)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: addgroup {} {}", self.user, self.group)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.user, "username")?;
        require_nonempty(&self.group, "group name")?;
        log::info!("Adding user {} to group {}", self.user, self.group);
        host.runner
            .run("", &format!("addgroup {} {}", self.user, self.group))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back adding user {} to group {}", self.user, self.group);
        host.runner
            .run("", &format!("delgroup {} {}", self.user, self.group))
            .map(|_| ())
            .inspect_err(|e| {
                log::error!(
                    "Failed to roll back adding user {} to group {}: {e}",
                    self.user,
                    self.group
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveUserFromGroup {
    pub user: String,
    pub group: String,
}

impl RemoveUserFromGroup {
    pub fn description(&self) -> String {
        format!("Remove user {} from group {}", self.user, self.group)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: delgroup {} {}", self.user, self.group)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.user, "username")?;
        require_nonempty(&self.group, "group name")?;
        log::info!("Removing user {} from group {}", self.user, self.group);
        host.runner
            .run("", &format!("delgroup {} {}", self.user, self.group))?;
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back removing user {} from group {}", self.user, self.group);
        host.runner
            .run("", &format!("addgroup {} {}", self.user, self.group))
            .map(|_| ())
            .inspect_err(|e| {
                log::error!(
                    "Failed to roll back removing user {} from group {}: {e}",
                    self.user,
                    self.group
                )
            })
    }
}
