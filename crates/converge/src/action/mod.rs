//! The action catalog.
//!
//! Every mutation the engine can perform is one variant of [`Action`]:
//! a forward `apply` paired with a compensating `rollback`, plus a
//! stable one-line description and the low-level details preview mode
//! prints. The set of kinds is closed, so a tagged enum carries them;
//! each kind keeps whatever original state its rollback needs as
//! private fields captured during `apply`.

mod file;
mod package;
mod service;
mod user;
mod user_package;

pub use file::{FileChmod, FileChown, FileCreate, FileDelete, FileRevert, FileUpdate};
pub use package::{PackageInstall, PackageRemove};
pub use service::{ServiceDisable, ServiceEnable};
pub use user::{AddUserToGroup, GroupCreate, RemoveUserFromGroup, UserCreate, UserRemove};
pub use user_package::UserPackage;

use crate::error::Result;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PackageInstall(PackageInstall),
    PackageRemove(PackageRemove),
    ServiceEnable(ServiceEnable),
    ServiceDisable(ServiceDisable),
    UserCreate(UserCreate),
    UserRemove(UserRemove),
    GroupCreate(GroupCreate),
    AddUserToGroup(AddUserToGroup),
    RemoveUserFromGroup(RemoveUserFromGroup),
    FileCreate(FileCreate),
    FileUpdate(FileUpdate),
    FileDelete(FileDelete),
    FileChmod(FileChmod),
    FileChown(FileChown),
    FileRevert(FileRevert),
    UserPackage(UserPackage),
}

impl Action {
    /// Stable human-readable summary. Depends only on declared fields,
    /// never on state captured during apply.
    pub fn description(&self) -> String {
        match self {
            Action::PackageInstall(a) => a.description(),
            Action::PackageRemove(a) => a.description(),
            Action::ServiceEnable(a) => a.description(),
            Action::ServiceDisable(a) => a.description(),
            Action::UserCreate(a) => a.description(),
            Action::UserRemove(a) => a.description(),
            Action::GroupCreate(a) => a.description(),
            Action::AddUserToGroup(a) => a.description(),
            Action::RemoveUserFromGroup(a) => a.description(),
            Action::FileCreate(a) => a.description(),
            Action::FileUpdate(a) => a.description(),
            Action::FileDelete(a) => a.description(),
            Action::FileChmod(a) => a.description(),
            Action::FileChown(a) => a.description(),
            Action::FileRevert(a) => a.description(),
            Action::UserPackage(a) => a.description(),
        }
    }

    /// The shell commands or file operations apply would perform.
    pub fn execution_details(&self) -> Vec<String> {
        match self {
            Action::PackageInstall(a) => a.execution_details(),
            Action::PackageRemove(a) => a.execution_details(),
            Action::ServiceEnable(a) => a.execution_details(),
            Action::ServiceDisable(a) => a.execution_details(),
            Action::UserCreate(a) => a.execution_details(),
            Action::UserRemove(a) => a.execution_details(),
            Action::GroupCreate(a) => a.execution_details(),
            Action::AddUserToGroup(a) => a.execution_details(),
            Action::RemoveUserFromGroup(a) => a.execution_details(),
            Action::FileCreate(a) => a.execution_details(),
            Action::FileUpdate(a) => a.execution_details(),
            Action::FileDelete(a) => a.execution_details(),
            Action::FileChmod(a) => a.execution_details(),
            Action::FileChown(a) => a.execution_details(),
            Action::FileRevert(a) => a.execution_details(),
            Action::UserPackage(a) => a.execution_details(),
        }
    }

    /// Perform the mutation, retaining whatever original state the
    /// rollback needs.
    pub fn apply(&mut self, host: &Host) -> Result<()> {
        match self {
            Action::PackageInstall(a) => a.apply(host),
            Action::PackageRemove(a) => a.apply(host),
            Action::ServiceEnable(a) => a.apply(host),
            Action::ServiceDisable(a) => a.apply(host),
            Action::UserCreate(a) => a.apply(host),
            Action::UserRemove(a) => a.apply(host),
            Action::GroupCreate(a) => a.apply(host),
            Action::AddUserToGroup(a) => a.apply(host),
            Action::RemoveUserFromGroup(a) => a.apply(host),
            Action::FileCreate(a) => a.apply(host),
            Action::FileUpdate(a) => a.apply(host),
            Action::FileDelete(a) => a.apply(host),
            Action::FileChmod(a) => a.apply(host),
            Action::FileChown(a) => a.apply(host),
            Action::FileRevert(a) => a.apply(host),
            Action::UserPackage(a) => a.apply(host),
        }
    }

    /// Best-effort reversal using the state captured during apply.
    pub fn rollback(&self, host: &Host) -> Result<()> {
        match self {
            Action::PackageInstall(a) => a.rollback(host),
            Action::PackageRemove(a) => a.rollback(host),
            Action::ServiceEnable(a) => a.rollback(host),
            Action::ServiceDisable(a) => a.rollback(host),
            Action::UserCreate(a) => a.rollback(host),
            Action::UserRemove(a) => a.rollback(host),
            Action::GroupCreate(a) => a.rollback(host),
            Action::AddUserToGroup(a) => a.rollback(host),
            Action::RemoveUserFromGroup(a) => a.rollback(host),
            Action::FileCreate(a) => a.rollback(host),
            Action::FileUpdate(a) => a.rollback(host),
            Action::FileDelete(a) => a.rollback(host),
            Action::FileChmod(a) => a.rollback(host),
            Action::FileChown(a) => a.rollback(host),
            Action::FileRevert(a) => a.rollback(host),
            Action::UserPackage(a) => a.rollback(host),
        }
    }

    /// Kind tag used by the structured plan output.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::PackageInstall(_) => "PackageInstall",
            Action::PackageRemove(_) => "PackageRemove",
            Action::ServiceEnable(_) => "ServiceEnable",
            Action::ServiceDisable(_) => "ServiceDisable",
            Action::UserCreate(_) => "UserCreate",
            Action::UserRemove(_) => "UserRemove",
            Action::GroupCreate(_) => "GroupCreate",
            Action::AddUserToGroup(_) => "AddUserToGroup",
            Action::RemoveUserFromGroup(_) => "RemoveUserFromGroup",
            Action::FileCreate(_) => "FileCreate",
            Action::FileUpdate(_) => "FileUpdate",
            Action::FileDelete(_) => "FileDelete",
            Action::FileChmod(_) => "FileChmod",
            Action::FileChown(_) => "FileChown",
            Action::FileRevert(_) => "FileRevert",
            Action::UserPackage(_) => "UserPackage",
        }
    }
}

pub(crate) fn require_nonempty(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::error::Error::Invalid(format!("{what} cannot be empty")));
    }
    Ok(())
}

pub(crate) fn parse_octal_mode(mode: &str) -> Result<u32> {
    u32::from_str_radix(mode, 8)
        .map_err(|_| crate::error::Error::Invalid(format!("invalid octal mode '{mode}'")))
}
