//! Dependency validation: reject desired states whose prerequisites the
//! current system cannot satisfy, before any action is generated.

use std::collections::HashSet;

use crate::error::{DependencyErrors, Result};
use crate::model::SystemState;

pub fn validate_dependencies(desired: &SystemState, current: &SystemState) -> Result<()> {
    let mut errors = Vec::new();
    errors.extend(user_package_manager_requirements(desired));
    errors.extend(service_availability(desired, current));
    errors.extend(user_availability(desired, current));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DependencyErrors(errors).into())
    }
}

/// Declaring pipx/npm packages for any user requires the corresponding
/// system package in the desired package set.
fn user_package_manager_requirements(desired: &SystemState) -> Vec<String> {
    let system_packages: HashSet<&str> =
        desired.packages.iter().map(|p| p.name.as_str()).collect();

    let mut pipx_packages = Vec::new();
    let mut npm_packages = Vec::new();
    for up in &desired.user_packages {
        pipx_packages.extend(up.pipx.iter().map(String::as_str));
        npm_packages.extend(up.npm.iter().map(String::as_str));
    }

    let mut errors = Vec::new();
    if !pipx_packages.is_empty() && !system_packages.contains("pipx") {
        errors.push(format!(
            "user packages require 'pipx' to be installed for packages: {}. Add 'pipx' to the system packages list.",
            pipx_packages.join(", ")
        ));
    }
    if !npm_packages.is_empty() && !system_packages.contains("npm") {
        errors.push(format!(
            "user packages require 'npm' to be installed for packages: {}. Add 'npm' to the system packages list.",
            npm_packages.join(", ")
        ));
    }
    errors
}

/// A service must exist on disk before it can be enabled or disabled.
fn service_availability(desired: &SystemState, current: &SystemState) -> Vec<String> {
    let available: HashSet<&str> = current.services.iter().map(|s| s.name.as_str()).collect();

    desired
        .services
        .iter()
        .filter(|s| !available.contains(s.name.as_str()))
        .map(|s| format!("service '{}' not found", s.name))
        .collect()
}

/// User packages can only be managed for accounts that already exist.
fn user_availability(desired: &SystemState, current: &SystemState) -> Vec<String> {
    let known: HashSet<&str> = current.users.iter().map(|u| u.name.as_str()).collect();

    desired
        .user_packages
        .iter()
        .filter(|up| !known.contains(up.user.as_str()))
        .map(|up| format!("user '{}' not found for user-packages", up.user))
        .collect()
}
