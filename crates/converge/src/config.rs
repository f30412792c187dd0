//! Configuration composer.
//!
//! Loads a YAML document, recursively folds its `includes` (each
//! resolved relative to the document that names it), merges per entity
//! policy, then validates and sorts the result. Include cycles are
//! detected via a set of absolute paths already seen; the set is never
//! pruned, so a document reachable twice aborts the load.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ValidationErrors};
use crate::host::Host;
use crate::model::{
    ConfigFileState, FileOrigin, PackageState, ServiceState, SystemState, UserPackageState,
    UserState,
};

/// Load, compose, validate, and sort a desired-state document.
pub fn load_config(path: &Path, host: &Host) -> Result<SystemState> {
    let cfg = load_config_file(path, host)?;

    let mut errs = ValidationErrors::default();
    for (i, include) in cfg.includes.iter().enumerate() {
        if include.trim().is_empty() {
            errs.push(format!("includes[{i}]"), "include path cannot be empty");
        }
    }
    if !errs.is_empty() {
        return Err(errs.into());
    }

    let mut cfg = if cfg.includes.is_empty() {
        cfg
    } else {
        let mut visited = HashSet::new();
        fold_includes(cfg, path, &mut visited, host)?
    };

    let errs = cfg.validate();
    if !errs.is_empty() {
        return Err(errs.into());
    }

    cfg.sort();
    Ok(cfg)
}

fn fold_includes(
    cfg: SystemState,
    base: &Path,
    visited: &mut HashSet<PathBuf>,
    host: &Host,
) -> Result<SystemState> {
    let abs = std::path::absolute(base).unwrap_or_else(|_| base.to_path_buf());
    if !visited.insert(abs) {
        return Err(Error::CircularInclude(base.display().to_string()));
    }

    let mut result = SystemState::default();
    for include in &cfg.includes {
        let resolved = resolve_include_path(base, include);
        let mut included = load_config_file(&resolved, host).map_err(|e| Error::Include {
            include: include.clone(),
            source: Box::new(e),
        })?;
        if !included.includes.is_empty() {
            included = fold_includes(included, &resolved, visited, host)?;
        }
        result = merge_configs(result, included);
    }

    // The including document itself has highest priority.
    Ok(merge_configs(result, cfg))
}

fn load_config_file(path: &Path, host: &Host) -> Result<SystemState> {
    let content = host.fs.read(path)?;
    let mut cfg: SystemState = serde_yaml::from_slice(&content).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    for config in &mut cfg.configs {
        config.origin = FileOrigin::Managed;
    }

    Ok(cfg)
}

fn resolve_include_path(base: &Path, include: &str) -> PathBuf {
    let include_path = Path::new(include);
    if include_path.is_absolute() {
        return include_path.to_path_buf();
    }
    base.parent().unwrap_or(Path::new(".")).join(include_path)
}

/// Merge `override_cfg` on top of `base` with entity-specific policy:
/// packages union by name, services last-wins by (name, runlevel),
/// users last-wins with group union, configs last-wins by path,
/// user-packages union per manager, ignore patterns deduplicated union.
/// Includes are not merged; they were already folded.
fn merge_configs(base: SystemState, override_cfg: SystemState) -> SystemState {
    SystemState {
        includes: Vec::new(),
        packages: merge_packages(base.packages, override_cfg.packages),
        services: merge_services(base.services, override_cfg.services),
        users: merge_users(base.users, override_cfg.users),
        configs: merge_file_configs(base.configs, override_cfg.configs),
        ignored_configs: merge_ignored(base.ignored_configs, override_cfg.ignored_configs),
        user_packages: merge_user_packages(base.user_packages, override_cfg.user_packages),
    }
}

fn merge_packages(base: Vec<PackageState>, override_pkgs: Vec<PackageState>) -> Vec<PackageState> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for pkg in base.into_iter().chain(override_pkgs) {
        if seen.insert(pkg.name.clone()) {
            result.push(pkg);
        }
    }
    result
}

fn merge_services(base: Vec<ServiceState>, override_svcs: Vec<ServiceState>) -> Vec<ServiceState> {
    let mut map: BTreeMap<(String, String), ServiceState> = BTreeMap::new();
    for svc in base {
        map.insert((svc.name.clone(), svc.runlevel.clone()), svc);
    }
    for svc in override_svcs {
        let key = (svc.name.clone(), svc.runlevel.clone());
        if let Some(existing) = map.get(&key) {
            log::warn!(
                "Service {} in runlevel '{}' overridden (enabled {} -> {})",
                svc.name,
                svc.runlevel,
                existing.enabled,
                svc.enabled
            );
        }
        map.insert(key, svc);
    }
    map.into_values().collect()
}

fn merge_users(base: Vec<UserState>, override_users: Vec<UserState>) -> Vec<UserState> {
    let mut map: BTreeMap<String, UserState> = BTreeMap::new();
    for user in base {
        map.insert(user.name.clone(), user);
    }
    for mut user in override_users {
        if let Some(existing) = map.get(&user.name) {
            let groups: BTreeSet<String> = existing
                .groups
                .iter()
                .chain(user.groups.iter())
                .cloned()
                .collect();
            user.groups = groups.into_iter().collect();
            log::warn!("User {} merged from multiple documents (groups unioned)", user.name);
        }
        map.insert(user.name.clone(), user);
    }
    map.into_values().collect()
}

fn merge_file_configs(
    base: Vec<ConfigFileState>,
    override_cfgs: Vec<ConfigFileState>,
) -> Vec<ConfigFileState> {
    let mut map: BTreeMap<String, ConfigFileState> = BTreeMap::new();
    for cfg in base {
        map.insert(cfg.path.clone(), cfg);
    }
    for cfg in override_cfgs {
        if map.contains_key(&cfg.path) {
            log::warn!("Config {} overridden", cfg.path);
        }
        map.insert(cfg.path.clone(), cfg);
    }
    map.into_values().collect()
}

fn merge_user_packages(
    base: Vec<UserPackageState>,
    override_pkgs: Vec<UserPackageState>,
) -> Vec<UserPackageState> {
    let mut map: BTreeMap<String, UserPackageState> = BTreeMap::new();
    for up in base {
        map.insert(up.user.clone(), up);
    }
    for mut up in override_pkgs {
        if let Some(existing) = map.get(&up.user) {
            let pipx: BTreeSet<String> =
                existing.pipx.iter().chain(up.pipx.iter()).cloned().collect();
            let npm: BTreeSet<String> = existing.npm.iter().chain(up.npm.iter()).cloned().collect();
            up.pipx = pipx.into_iter().collect();
            up.npm = npm.into_iter().collect();
            log::warn!("User packages for {} merged from multiple documents", up.user);
        }
        map.insert(up.user.clone(), up);
    }
    map.into_values().collect()
}

fn merge_ignored(base: Vec<String>, override_patterns: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for pattern in base.into_iter().chain(override_patterns) {
        if seen.insert(pattern.clone()) {
            result.push(pattern);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFs;
    use crate::testutil::MockRunner;

    fn load(fs: &MemFs, path: &str) -> Result<SystemState> {
        let runner = MockRunner::new();
        let host = Host::new(&runner, fs);
        load_config(Path::new(path), &host)
    }

    #[test]
    fn test_load_simple_document() {
        let fs = MemFs::new();
        fs.add_file(
            "/config/system.yaml",
            "packages:\n  - name: vim\n  - name: curl\nconfigs:\n  - path: /etc/motd\n    content: hi\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.packages.len(), 2);
        assert_eq!(state.packages[0].name, "curl"); // sorted
        assert_eq!(state.configs[0].origin, FileOrigin::Managed);
    }

    #[test]
    fn test_load_missing_file() {
        let fs = MemFs::new();
        assert!(load(&fs, "/config/missing.yaml").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let fs = MemFs::new();
        fs.add_file("/config/system.yaml", "packages: [::");
        let err = load(&fs, "/config/system.yaml").unwrap_err();
        assert!(err.to_string().contains("invalid YAML"));
    }

    #[test]
    fn test_load_empty_include_path() {
        let fs = MemFs::new();
        fs.add_file("/config/system.yaml", "includes:\n  - \"  \"\n");
        let err = load(&fs, "/config/system.yaml").unwrap_err();
        assert!(err.to_string().contains("include path cannot be empty"));
    }

    #[test]
    fn test_includes_merge_packages_by_union() {
        let fs = MemFs::new();
        fs.add_file("/config/base.yaml", "packages:\n  - name: vim\n  - name: curl\n");
        fs.add_file(
            "/config/system.yaml",
            "includes:\n  - base.yaml\npackages:\n  - name: vim\n  - name: htop\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        let names: Vec<&str> = state.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["curl", "htop", "vim"]);
    }

    #[test]
    fn test_includes_last_wins_for_configs() {
        let fs = MemFs::new();
        fs.add_file(
            "/config/base.yaml",
            "configs:\n  - path: /etc/motd\n    content: from base\n",
        );
        fs.add_file(
            "/config/system.yaml",
            "includes:\n  - base.yaml\nconfigs:\n  - path: /etc/motd\n    content: from top\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.configs.len(), 1);
        assert_eq!(state.configs[0].content, "from top");
    }

    #[test]
    fn test_includes_union_user_groups() {
        let fs = MemFs::new();
        fs.add_file(
            "/config/base.yaml",
            "users:\n  - name: alice\n    groups: [wheel, audio]\n",
        );
        fs.add_file(
            "/config/system.yaml",
            "includes:\n  - base.yaml\nusers:\n  - name: alice\n    groups: [docker, wheel]\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.users.len(), 1);
        assert_eq!(state.users[0].groups, vec!["audio", "docker", "wheel"]);
    }

    #[test]
    fn test_includes_union_user_packages() {
        let fs = MemFs::new();
        fs.add_file(
            "/config/base.yaml",
            "users:\n  - name: alice\nuser-packages:\n  - user: alice\n    pipx: [black]\n",
        );
        fs.add_file(
            "/config/system.yaml",
            "includes:\n  - base.yaml\nuser-packages:\n  - user: alice\n    pipx: [ruff]\n    npm: [prettier]\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.user_packages.len(), 1);
        assert_eq!(state.user_packages[0].pipx, vec!["black", "ruff"]);
        assert_eq!(state.user_packages[0].npm, vec!["prettier"]);
    }

    #[test]
    fn test_includes_dedupe_ignored_configs() {
        let fs = MemFs::new();
        fs.add_file("/config/base.yaml", "ignored-configs:\n  - /etc/resolv.conf\n");
        fs.add_file(
            "/config/system.yaml",
            "includes:\n  - base.yaml\nignored-configs:\n  - /etc/resolv.conf\n  - /etc/hosts\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.ignored_configs, vec!["/etc/resolv.conf", "/etc/hosts"]);
    }

    #[test]
    fn test_nested_includes() {
        let fs = MemFs::new();
        fs.add_file("/config/deep.yaml", "packages:\n  - name: curl\n");
        fs.add_file("/config/base.yaml", "includes:\n  - deep.yaml\npackages:\n  - name: vim\n");
        fs.add_file("/config/system.yaml", "includes:\n  - base.yaml\npackages:\n  - name: htop\n");

        let state = load(&fs, "/config/system.yaml").unwrap();
        let names: Vec<&str> = state.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["curl", "htop", "vim"]);
    }

    #[test]
    fn test_absolute_include_path() {
        let fs = MemFs::new();
        fs.add_file("/shared/common.yaml", "packages:\n  - name: curl\n");
        fs.add_file("/config/system.yaml", "includes:\n  - /shared/common.yaml\n");

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.packages[0].name, "curl");
    }

    #[test]
    fn test_circular_include_detected() {
        let fs = MemFs::new();
        fs.add_file("/config/a.yaml", "includes:\n  - b.yaml\n");
        fs.add_file("/config/b.yaml", "includes:\n  - a.yaml\n");

        let err = load(&fs, "/config/a.yaml").unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_missing_include_names_the_include() {
        let fs = MemFs::new();
        fs.add_file("/config/system.yaml", "includes:\n  - nope.yaml\n");

        let err = load(&fs, "/config/system.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to load include 'nope.yaml'"));
    }

    #[test]
    fn test_validation_errors_are_batched() {
        let fs = MemFs::new();
        fs.add_file(
            "/config/system.yaml",
            "packages:\n  - name: \"\"\nconfigs:\n  - path: etc/motd\n    mode: \"999\"\n",
        );

        let err = load(&fs, "/config/system.yaml").unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("configuration validation failed"));
        assert!(rendered.contains("packages[0].name"));
        assert!(rendered.contains("configs[0].path"));
        assert!(rendered.contains("configs[0].mode"));
    }

    #[test]
    fn test_service_last_wins_by_name_and_runlevel() {
        let fs = MemFs::new();
        fs.add_file(
            "/config/base.yaml",
            "services:\n  - name: sshd\n    enabled: false\n    runlevel: default\n",
        );
        fs.add_file(
            "/config/system.yaml",
            "includes:\n  - base.yaml\nservices:\n  - name: sshd\n    enabled: true\n    runlevel: default\n",
        );

        let state = load(&fs, "/config/system.yaml").unwrap();
        assert_eq!(state.services.len(), 1);
        assert!(state.services[0].enabled);
    }
}
