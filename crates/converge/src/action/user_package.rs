//! Per-user language-level package actions (pipx, npm), run as the
//! target user.

use super::require_nonempty;
use crate::error::Result;
use crate::host::Host;
use crate::model::PackageTarget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPackage {
    pub user: String,
    pub manager: String,
    pub package: String,
    pub target: PackageTarget,
}

impl UserPackage {
    pub fn description(&self) -> String {
        format!(
            "Ensure user package '{}' for user '{}' managed by '{}' is {}",
            self.package, self.user, self.manager, self.target
        )
    }

    pub fn execution_details(&self) -> Vec<String> {
        let verb = match self.target {
            PackageTarget::Present => "install",
            PackageTarget::Absent => "uninstall",
        };
        vec![format!(
            "su -l {} -c '{} {verb} {}'",
            self.user, self.manager, self.package
        )]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        require_nonempty(&self.user, "user")?;
        require_nonempty(&self.manager, "manager")?;
        require_nonempty(&self.package, "package")?;

        let command = match self.target {
            PackageTarget::Present => format!("{} install {}", self.manager, self.package),
            PackageTarget::Absent => format!("{} uninstall {}", self.manager, self.package),
        };
        log::info!("Running user package command for {}: {command}", self.user);
        host.runner.run(&self.user, &command)?;
        Ok(())
    }

    /// The reverse of the declared target. No previous version is
    /// recorded, so an uninstall is compensated by a plain install.
    pub fn rollback(&self, host: &Host) -> Result<()> {
        let command = match self.target {
            PackageTarget::Present => format!("{} uninstall {}", self.manager, self.package),
            PackageTarget::Absent => format!("{} install {}", self.manager, self.package),
        };
        log::info!("Rolling back user package command for {}: {command}", self.user);
        if let Err(e) = host.runner.run(&self.user, &command) {
            log::error!(
                "Failed to roll back user package '{}' for user {}: {e}",
                self.package,
                self.user
            );
            log::warn!(
                "The {} environment for user {} may be in an inconsistent state and require manual intervention",
                self.manager,
                self.user
            );
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::filesystem::MemFs;
    use crate::testutil::MockRunner;

    #[test]
    fn test_description_is_stable() {
        let action = UserPackage {
            user: "alice".to_string(),
            manager: "pipx".to_string(),
            package: "ruff".to_string(),
            target: PackageTarget::Present,
        };
        assert_eq!(
            action.description(),
            "Ensure user package 'ruff' for user 'alice' managed by 'pipx' is present"
        );
        assert_eq!(action.execution_details(), vec!["su -l alice -c 'pipx install ruff'"]);
    }

    #[test]
    fn test_apply_runs_as_target_user() {
        let runner = MockRunner::new();
        let fs = MemFs::new();
        let host = Host::new(&runner, &fs);

        let mut action = Action::UserPackage(UserPackage {
            user: "alice".to_string(),
            manager: "npm".to_string(),
            package: "prettier".to_string(),
            target: PackageTarget::Absent,
        });
        action.apply(&host).unwrap();

        assert_eq!(runner.commands_for_user("alice"), vec!["npm uninstall prettier"]);
        assert!(runner.commands_for_user("").is_empty());
    }

    #[test]
    fn test_rollback_runs_opposite_verb() {
        let runner = MockRunner::new();
        let fs = MemFs::new();
        let host = Host::new(&runner, &fs);

        let action = UserPackage {
            user: "alice".to_string(),
            manager: "pipx".to_string(),
            package: "ruff".to_string(),
            target: PackageTarget::Present,
        };
        action.rollback(&host).unwrap();
        assert_eq!(runner.commands_for_user("alice"), vec!["pipx uninstall ruff"]);
    }

    #[test]
    fn test_rollback_failure_is_returned() {
        let runner = MockRunner::new();
        runner.fail("alice", "pipx uninstall ruff", "pipx: command not found");
        let fs = MemFs::new();
        let host = Host::new(&runner, &fs);

        let action = UserPackage {
            user: "alice".to_string(),
            manager: "pipx".to_string(),
            package: "ruff".to_string(),
            target: PackageTarget::Present,
        };
        assert!(action.rollback(&host).is_err());
    }
}
