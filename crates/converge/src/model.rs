//! Typed representation of desired and current system state.
//!
//! Both sides of the diff share one shape; they differ only in
//! provenance. Desired state is composed from YAML documents, current
//! state is inferred from the live system. Runtime-only fields (origin,
//! primary group, deletion flag) are never serialized.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::ValidationErrors;

/// Where a config file under `/etc` came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileOrigin {
    /// Declared in a configuration document.
    #[default]
    Managed,
    /// Created outside the package manager (`apk audit` status `A`).
    UserCreated,
    /// Shipped by a package and modified since (`apk audit` status `U`).
    PackageModified,
}

/// Target state for a per-user language-level package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageTarget {
    Present,
    Absent,
}

impl fmt::Display for PackageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageTarget::Present => write!(f, "present"),
            PackageTarget::Absent => write!(f, "absent"),
        }
    }
}

/// OpenRC runlevels a service may be assigned to.
pub const VALID_RUNLEVELS: &[&str] = &["boot", "default", "sysinit", "nonetwork", "shutdown"];

pub fn is_valid_runlevel(runlevel: &str) -> bool {
    VALID_RUNLEVELS.contains(&runlevel)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    /// Configuration documents folded into this one before validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(default)]
    pub packages: Vec<PackageState>,

    #[serde(default)]
    pub services: Vec<ServiceState>,

    #[serde(default)]
    pub users: Vec<UserState>,

    #[serde(default)]
    pub configs: Vec<ConfigFileState>,

    /// Paths or glob patterns the engine must not touch.
    #[serde(default, rename = "ignored-configs", skip_serializing_if = "Vec::is_empty")]
    pub ignored_configs: Vec<String>,

    #[serde(default, rename = "user-packages", skip_serializing_if = "Vec::is_empty")]
    pub user_packages: Vec<UserPackageState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageState {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// Empty means disabled and not assigned to any runlevel.
    #[serde(default)]
    pub runlevel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Resolved from the gid field of `/etc/passwd`; current state only.
    #[serde(skip)]
    pub primary_group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileState {
    pub path: String,
    #[serde(default)]
    pub content: String,
    /// Octal string of the form `0NNN`; empty means unspecified.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,

    #[serde(skip)]
    pub origin: FileOrigin,
    /// Set when `apk audit` reports the file deleted; current state only.
    #[serde(skip)]
    pub deleted: bool,
    /// Owning package for `PackageModified` files; current state only.
    #[serde(skip)]
    pub origin_package: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPackageState {
    pub user: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipx: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub npm: Vec<String>,
}

/// A config path the engine refused to consider, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredConfig {
    pub path: String,
    pub reason: String,
}

impl SystemState {
    /// Sort every list by its natural key so plan generation and state
    /// dumps are deterministic.
    pub fn sort(&mut self) {
        self.packages.sort_by(|a, b| a.name.cmp(&b.name));
        self.services
            .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.runlevel.cmp(&b.runlevel)));
        self.users.sort_by(|a, b| a.name.cmp(&b.name));
        self.configs.sort_by(|a, b| a.path.cmp(&b.path));
        self.user_packages.sort_by(|a, b| a.user.cmp(&b.user));
    }

    /// Check every invariant of a composed document, returning all
    /// violations in one batch.
    pub fn validate(&self) -> ValidationErrors {
        let mut errs = ValidationErrors::default();

        for (i, include) in self.includes.iter().enumerate() {
            if include.trim().is_empty() {
                errs.push(format!("includes[{i}]"), "include path cannot be empty");
            }
        }

        for (i, pkg) in self.packages.iter().enumerate() {
            if pkg.name.trim().is_empty() {
                errs.push(format!("packages[{i}].name"), "package name cannot be empty");
            }
            if !is_valid_package_name(&pkg.name) {
                errs.push(
                    format!("packages[{i}].name"),
                    "package name contains invalid characters",
                );
            }
        }

        for (i, svc) in self.services.iter().enumerate() {
            if svc.name.trim().is_empty() {
                errs.push(format!("services[{i}].name"), "service name cannot be empty");
            }
            // An empty runlevel is valid for disabled services.
            if !svc.runlevel.is_empty() && !is_valid_runlevel(&svc.runlevel) {
                errs.push(
                    format!("services[{i}].runlevel"),
                    format!(
                        "invalid runlevel '{}', must be one of: boot, default, sysinit, nonetwork, shutdown",
                        svc.runlevel
                    ),
                );
            }
        }

        for (i, user) in self.users.iter().enumerate() {
            if user.name.trim().is_empty() {
                errs.push(format!("users[{i}].name"), "user name cannot be empty");
            }
            if !is_valid_user_name(&user.name) {
                errs.push(
                    format!("users[{i}].name"),
                    "user name contains invalid characters (only lowercase letters, numbers, hyphens, and underscores allowed)",
                );
            }
            for (j, group) in user.groups.iter().enumerate() {
                if !is_valid_user_name(group) {
                    errs.push(
                        format!("users[{i}].groups[{j}]"),
                        "group name contains invalid characters",
                    );
                }
            }
        }

        for (i, cfg) in self.configs.iter().enumerate() {
            if cfg.path.trim().is_empty() {
                errs.push(format!("configs[{i}].path"), "config path cannot be empty");
            }
            if !cfg.path.starts_with('/') {
                errs.push(
                    format!("configs[{i}].path"),
                    "config path must be absolute (start with '/')",
                );
            }
            if cfg.path.contains("..") {
                errs.push(format!("configs[{i}].path"), "config path cannot contain '..'");
            }
            if is_intrinsic_ignore(&cfg.path) {
                errs.push(
                    format!("configs[{i}].path"),
                    "cannot manage intrinsically ignored file (security/safety reasons)",
                );
            }
            if !cfg.mode.is_empty() && !is_valid_octal_mode(&cfg.mode) {
                errs.push(
                    format!("configs[{i}].mode"),
                    "mode must be a valid octal value like '0755' or '0644'",
                );
            }
            if !cfg.owner.is_empty() && !is_valid_user_name(&cfg.owner) {
                errs.push(format!("configs[{i}].owner"), "owner contains invalid characters");
            }
            if !cfg.group.is_empty() && !is_valid_user_name(&cfg.group) {
                errs.push(format!("configs[{i}].group"), "group contains invalid characters");
            }
        }

        let known_users: HashSet<&str> = self.users.iter().map(|u| u.name.as_str()).collect();
        for (i, up) in self.user_packages.iter().enumerate() {
            if !known_users.contains(up.user.as_str()) {
                errs.push(
                    format!("user-packages[{i}].user"),
                    format!("user '{}' not defined in users section", up.user),
                );
            }
            for (j, pkg) in up.pipx.iter().enumerate() {
                if !is_valid_package_name(pkg) {
                    errs.push(
                        format!("user-packages[{i}].pipx[{j}]"),
                        "package name contains invalid characters",
                    );
                }
            }
            for (j, pkg) in up.npm.iter().enumerate() {
                if !is_valid_package_name(pkg) {
                    errs.push(
                        format!("user-packages[{i}].npm[{j}]"),
                        "package name contains invalid characters",
                    );
                }
            }
        }

        errs
    }
}

/// Package names may contain anything printable; only control
/// characters are rejected.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.chars().any(|c| c.is_control())
}

/// User and group names are restricted to `[a-z0-9_-]`.
pub fn is_valid_user_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

pub fn is_valid_octal_mode(mode: &str) -> bool {
    let bytes = mode.as_bytes();
    bytes.len() == 4 && bytes[0] == b'0' && bytes[1..].iter().all(|b| (b'0'..=b'7').contains(b))
}

const INTRINSIC_EXACT: &[&str] = &[
    "/etc/passwd",    // user database, managed by system tools
    "/etc/group",     // group database, managed by system tools
    "/etc/shadow",    // shadow password file
    "/etc/apk/world", // apk's own record of installed packages
];

const INTRINSIC_PREFIX: &[&str] = &[
    "/etc/apk/keys", // apk trusted keys
    "/etc/apk/arch", // architecture marker set at installation
    "/etc/apk/protected_paths.d/ca-certificates.list",
];

/// Paths the engine refuses to manage regardless of user configuration.
/// Returns the reason string recorded when the path is skipped during
/// inference, or `None` when the path is fair game.
pub fn intrinsic_ignore_reason(path: &str) -> Option<String> {
    if path.starts_with("/etc/runlevels") {
        return Some("intrinsic: runlevel files".to_string());
    }
    if path.ends_with('-') || path.ends_with(".bak") {
        return Some("intrinsic: backup file".to_string());
    }
    for candidate in INTRINSIC_EXACT {
        if path == *candidate {
            return Some(format!("intrinsic: {candidate}"));
        }
    }
    for candidate in INTRINSIC_PREFIX {
        if path.starts_with(candidate) {
            return Some(format!("intrinsic: {candidate}"));
        }
    }
    None
}

pub fn is_intrinsic_ignore(path: &str) -> bool {
    intrinsic_ignore_reason(path).is_some()
}
