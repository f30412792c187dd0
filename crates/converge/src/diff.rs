//! Diff engine: pair desired and current state and emit an ordered plan.
//!
//! Categories are emitted in a fixed order (packages, services, users,
//! configs, user packages) and actions within each category come out in
//! sorted-key order, so a plan is deterministic across runs for the
//! same pair of states.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;

use crate::action::{
    Action, AddUserToGroup, FileChmod, FileChown, FileCreate, FileDelete, FileRevert, FileUpdate,
    GroupCreate, PackageInstall, PackageRemove, RemoveUserFromGroup, ServiceDisable, ServiceEnable,
    UserCreate, UserPackage, UserRemove,
};
use crate::error::{Error, Result};
use crate::glob::matches_glob;
use crate::host::Host;
use crate::model::{
    is_intrinsic_ignore, FileOrigin, PackageState, PackageTarget, ServiceState, SystemState,
    UserState,
};
use crate::runner::CommandRunner;
use crate::validate::validate_dependencies;

const GROUP_FILE: &str = "/etc/group";

/// Compute the plan that transforms `current` into `desired`.
pub fn calculate_plan(
    desired: &SystemState,
    current: &SystemState,
    host: &Host,
    prune_unmanaged: bool,
) -> Result<Vec<Action>> {
    validate_dependencies(desired, current)?;

    let mut plan = Vec::new();
    plan.extend(package_actions(&desired.packages, &current.packages));
    plan.extend(service_actions(&desired.services, &current.services));
    plan.extend(user_actions(&desired.users, &current.users, host.runner)?);
    plan.extend(config_actions(desired, current, prune_unmanaged));
    plan.extend(user_package_actions(desired, host.runner));

    Ok(plan)
}

fn package_actions(desired: &[PackageState], current: &[PackageState]) -> Vec<Action> {
    let desired_names: BTreeSet<&str> = desired.iter().map(|p| p.name.as_str()).collect();
    let current_names: BTreeSet<&str> = current.iter().map(|p| p.name.as_str()).collect();

    let mut actions = Vec::new();
    for name in desired_names.difference(&current_names) {
        actions.push(Action::PackageInstall(PackageInstall {
            package: name.to_string(),
        }));
    }
    for name in current_names.difference(&desired_names) {
        actions.push(Action::PackageRemove(PackageRemove {
            package: name.to_string(),
        }));
    }
    actions
}

fn service_actions(desired: &[ServiceState], current: &[ServiceState]) -> Vec<Action> {
    let desired_map: BTreeMap<&str, &ServiceState> =
        desired.iter().map(|s| (s.name.as_str(), s)).collect();
    let current_map: BTreeMap<&str, &ServiceState> =
        current.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut actions = Vec::new();
    for (name, want) in &desired_map {
        match current_map.get(name) {
            Some(have) => {
                if want.enabled && !have.enabled {
                    actions.push(Action::ServiceEnable(ServiceEnable {
                        service: name.to_string(),
                        runlevel: want.runlevel.clone(),
                    }));
                } else if !want.enabled && have.enabled {
                    actions.push(Action::ServiceDisable(ServiceDisable {
                        service: name.to_string(),
                        runlevel: have.runlevel.clone(),
                    }));
                }
            }
            None => {
                if want.enabled {
                    actions.push(Action::ServiceEnable(ServiceEnable {
                        service: name.to_string(),
                        runlevel: want.runlevel.clone(),
                    }));
                }
            }
        }
    }

    for (name, have) in &current_map {
        if !desired_map.contains_key(name) && have.enabled {
            actions.push(Action::ServiceDisable(ServiceDisable {
                service: name.to_string(),
                runlevel: have.runlevel.clone(),
            }));
        }
    }

    actions
}

fn user_actions(
    desired: &[UserState],
    current: &[UserState],
    runner: &dyn CommandRunner,
) -> Result<Vec<Action>> {
    let mut actions = Vec::new();

    let mut known_groups = current_system_groups(runner)
        .map_err(|e| Error::Other(format!("failed to infer current system groups: {e}")))?;

    // Any group a desired user references must exist before membership
    // changes run.
    let required_groups: BTreeSet<&str> = desired
        .iter()
        .flat_map(|u| u.groups.iter().map(String::as_str))
        .collect();
    for group in required_groups {
        if !known_groups.contains(group) {
            actions.push(Action::GroupCreate(GroupCreate {
                group: group.to_string(),
            }));
            known_groups.insert(group.to_string());
        }
    }

    let current_map: HashMap<&str, &UserState> =
        current.iter().map(|u| (u.name.as_str(), u)).collect();

    for want in desired {
        match current_map.get(want.name.as_str()) {
            None => {
                actions.push(Action::UserCreate(UserCreate {
                    user: want.name.clone(),
                }));
                let groups: BTreeSet<&str> = want.groups.iter().map(String::as_str).collect();
                for group in groups {
                    actions.push(Action::AddUserToGroup(AddUserToGroup {
                        user: want.name.clone(),
                        group: group.to_string(),
                    }));
                }
            }
            Some(have) => {
                let want_groups: BTreeSet<&str> = want.groups.iter().map(String::as_str).collect();
                let have_groups: BTreeSet<&str> = have.groups.iter().map(String::as_str).collect();

                for group in want_groups.difference(&have_groups) {
                    actions.push(Action::AddUserToGroup(AddUserToGroup {
                        user: want.name.clone(),
                        group: group.to_string(),
                    }));
                }
                for group in have_groups.difference(&want_groups) {
                    // Never detach a user from its primary group.
                    if *group == have.primary_group {
                        continue;
                    }
                    actions.push(Action::RemoveUserFromGroup(RemoveUserFromGroup {
                        user: want.name.clone(),
                        group: group.to_string(),
                    }));
                }
            }
        }
    }

    let desired_names: BTreeSet<&str> = desired.iter().map(|u| u.name.as_str()).collect();
    let current_names: BTreeSet<&str> = current.iter().map(|u| u.name.as_str()).collect();
    for name in current_names.difference(&desired_names) {
        actions.push(Action::UserRemove(UserRemove {
            user: name.to_string(),
        }));
    }

    Ok(actions)
}

fn current_system_groups(runner: &dyn CommandRunner) -> Result<BTreeSet<String>> {
    let output = runner.run("", &format!("sh -c 'cat {GROUP_FILE}'"))?;
    let output = String::from_utf8_lossy(&output);

    let mut groups = BTreeSet::new();
    for line in output.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.split(':').next() {
            if !name.is_empty() {
                groups.insert(name.to_string());
            }
        }
    }
    Ok(groups)
}

fn config_actions(desired: &SystemState, current: &SystemState, prune_unmanaged: bool) -> Vec<Action> {
    // The ignore predicate is the union of the intrinsic set and the
    // user's patterns.
    let is_ignored = |path: &str| {
        is_intrinsic_ignore(path)
            || desired
                .ignored_configs
                .iter()
                .any(|pattern| matches_glob(pattern, path))
    };

    let desired_map: BTreeMap<&str, &crate::model::ConfigFileState> = desired
        .configs
        .iter()
        .filter(|c| !is_ignored(&c.path))
        .map(|c| (c.path.as_str(), c))
        .collect();
    let current_map: BTreeMap<&str, &crate::model::ConfigFileState> = current
        .configs
        .iter()
        .filter(|c| !is_ignored(&c.path))
        .map(|c| (c.path.as_str(), c))
        .collect();

    let mut actions = Vec::new();
    for (path, want) in &desired_map {
        match current_map.get(path) {
            Some(have) => {
                if want.content != have.content {
                    actions.push(Action::FileUpdate(FileUpdate::new(*path, want.content.clone())));
                }
                if !want.mode.is_empty() && want.mode != have.mode {
                    actions.push(Action::FileChmod(FileChmod::new(*path, want.mode.clone())));
                }
                if (!want.owner.is_empty() && want.owner != have.owner)
                    || (!want.group.is_empty() && want.group != have.group)
                {
                    actions.push(Action::FileChown(FileChown::new(
                        *path,
                        want.owner.clone(),
                        want.group.clone(),
                    )));
                }
            }
            None => {
                actions.push(Action::FileCreate(FileCreate {
                    path: path.to_string(),
                    content: want.content.clone(),
                    mode: want.mode.clone(),
                    owner: want.owner.clone(),
                    group: want.group.clone(),
                }));
            }
        }
    }

    for (path, have) in &current_map {
        if desired_map.contains_key(path) {
            continue;
        }
        match have.origin {
            FileOrigin::UserCreated => {
                if prune_unmanaged {
                    actions.push(Action::FileDelete(FileDelete::new(*path)));
                } else {
                    log::warn!(
                        "Unmanaged file found {path} (created outside package manager); consider adding it to ignored-configs or use --prune-unmanaged to delete"
                    );
                }
            }
            FileOrigin::PackageModified => {
                actions.push(Action::FileRevert(FileRevert::new(
                    *path,
                    have.origin_package.clone(),
                )));
            }
            FileOrigin::Managed => {}
        }
    }

    actions
}

fn user_package_actions(desired: &SystemState, runner: &dyn CommandRunner) -> Vec<Action> {
    let mut actions = Vec::new();
    for up in &desired.user_packages {
        if !up.pipx.is_empty() {
            actions.extend(compare_user_packages(&up.user, "pipx", &up.pipx, runner));
        }
        if !up.npm.is_empty() {
            actions.extend(compare_user_packages(&up.user, "npm", &up.npm, runner));
        }
    }
    actions
}

#[derive(Deserialize)]
struct PipxList {
    #[serde(default)]
    venvs: HashMap<String, PipxVenv>,
}

#[derive(Deserialize)]
struct PipxVenv {
    metadata: PipxMetadata,
}

#[derive(Deserialize)]
struct PipxMetadata {
    package: String,
}

#[derive(Deserialize)]
struct NpmList {
    #[serde(default)]
    dependencies: HashMap<String, serde_json::Value>,
}

/// Discover what `manager` has installed for `user` and emit the
/// present/absent actions that reconcile it with `desired_packages`.
/// A manager that cannot be listed contributes nothing but a warning.
fn compare_user_packages(
    user: &str,
    manager: &str,
    desired_packages: &[String],
    runner: &dyn CommandRunner,
) -> Vec<Action> {
    let output = match runner.run(user, &format!("{manager} list --json")) {
        Ok(output) => output,
        Err(e) => {
            log::warn!("could not list {manager} packages for user {user}: {e}");
            return Vec::new();
        }
    };

    let installed: Vec<String> = match manager {
        "pipx" => match serde_json::from_slice::<PipxList>(&output) {
            Ok(list) => list.venvs.into_values().map(|v| v.metadata.package).collect(),
            Err(e) => {
                log::warn!("could not parse pipx list output for user {user}: {e}");
                return Vec::new();
            }
        },
        "npm" => match serde_json::from_slice::<NpmList>(&output) {
            Ok(list) => list.dependencies.into_keys().collect(),
            Err(e) => {
                log::warn!("could not parse npm list output for user {user}: {e}");
                return Vec::new();
            }
        },
        _ => Vec::new(),
    };

    let desired_set: BTreeSet<&str> = desired_packages.iter().map(String::as_str).collect();
    let installed_set: BTreeSet<&str> = installed.iter().map(String::as_str).collect();

    let mut actions = Vec::new();
    for package in desired_set.difference(&installed_set) {
        actions.push(Action::UserPackage(UserPackage {
            user: user.to_string(),
            manager: manager.to_string(),
            package: package.to_string(),
            target: PackageTarget::Present,
        }));
    }
    for package in installed_set.difference(&desired_set) {
        actions.push(Action::UserPackage(UserPackage {
            user: user.to_string(),
            manager: manager.to_string(),
            package: package.to_string(),
            target: PackageTarget::Absent,
        }));
    }
    actions
}
