//! Current-state inference.
//!
//! Derives a [`SystemState`] from the live system: the apk world file,
//! the OpenRC init script and runlevel directories, the passwd/group
//! databases, and the package manager's audit of drifted files under
//! `/etc`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::host::Host;
use crate::model::{
    intrinsic_ignore_reason, ConfigFileState, FileOrigin, IgnoredConfig, PackageState,
    ServiceState, SystemState, UserState, VALID_RUNLEVELS,
};
use crate::runner::CommandRunner;

const WORLD_PATH: &str = "/etc/apk/world";
const SERVICES_DIR: &str = "/etc/init.d";
const PASSWD_PATH: &str = "/etc/passwd";
const GROUP_PATH: &str = "/etc/group";

/// Infer the current system state. Returns the state together with the
/// list of audit paths that were skipped and why. Intrinsically ignored
/// paths are always excluded from the state; `skip_intrinsic_ignores`
/// only suppresses recording them in the skip list.
pub fn infer_system_state(
    host: &Host,
    skip_intrinsic_ignores: bool,
) -> Result<(SystemState, Vec<IgnoredConfig>)> {
    let packages = list_installed_packages(host)?;
    let services = list_services(host)?;
    let users = list_users(host)?;
    let (configs, ignored) = list_config_files(host, skip_intrinsic_ignores)?;

    Ok((
        SystemState {
            packages,
            services,
            users,
            configs,
            ..Default::default()
        },
        ignored,
    ))
}

fn list_installed_packages(host: &Host) -> Result<Vec<PackageState>> {
    let content = host.fs.read(Path::new(WORLD_PATH))?;
    let content = String::from_utf8_lossy(&content);

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| PackageState { name: name.to_string() })
        .collect())
}

fn list_services(host: &Host) -> Result<Vec<ServiceState>> {
    let entries = host.fs.read_dir(Path::new(SERVICES_DIR))?;

    let mut services = Vec::new();
    for entry in entries {
        if entry.is_dir || entry.name.ends_with(".sh") {
            continue;
        }

        // First runlevel directory holding a link for this script wins.
        let mut enabled = false;
        let mut runlevel = String::new();
        for rl in VALID_RUNLEVELS {
            let link = Path::new("/etc/runlevels").join(rl).join(&entry.name);
            if host.fs.exists(&link) {
                enabled = true;
                runlevel = rl.to_string();
                break;
            }
        }

        // Disabled services are recorded too so a disable request in the
        // desired state has something to pair against.
        services.push(ServiceState {
            name: entry.name,
            enabled,
            runlevel,
        });
    }

    Ok(services)
}

fn list_users(host: &Host) -> Result<Vec<UserState>> {
    let gid_to_name = build_gid_map(host)?;

    let passwd = host.fs.read(Path::new(PASSWD_PATH))?;
    let passwd = String::from_utf8_lossy(&passwd);

    let mut users = Vec::new();
    for line in passwd.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            continue;
        }

        let uid: u32 = match fields[2].parse() {
            Ok(uid) => uid,
            Err(_) => continue,
        };
        if uid < 1000 {
            continue;
        }

        // Only accounts somebody can log into are modeled.
        if fields[6].is_empty() || fields[6].contains("nologin") {
            continue;
        }

        let gid: u32 = match fields[3].parse() {
            Ok(gid) => gid,
            Err(_) => continue,
        };
        let primary_group = gid_to_name
            .get(&gid)
            .cloned()
            .unwrap_or_else(|| gid.to_string());

        let name = fields[0].to_string();
        let groups = list_groups_for_user(host.runner, &name)?;

        users.push(UserState {
            name,
            groups,
            primary_group,
        });
    }

    Ok(users)
}

fn build_gid_map(host: &Host) -> Result<HashMap<u32, String>> {
    let content = host.fs.read(Path::new(GROUP_PATH))?;
    let content = String::from_utf8_lossy(&content);

    let mut map = HashMap::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 4 {
            continue;
        }
        if let Ok(gid) = fields[2].parse::<u32>() {
            map.insert(gid, fields[0].to_string());
        }
    }
    Ok(map)
}

fn list_groups_for_user(runner: &dyn CommandRunner, user: &str) -> Result<Vec<String>> {
    let output = match runner.run("", &format!("groups {user}")) {
        Ok(output) => output,
        // A user present in passwd but unknown to the groups tool is not
        // fatal; it simply has no memberships yet.
        Err(err) if err.to_string().contains("no such user") => return Ok(Vec::new()),
        Err(err) => {
            return Err(Error::Other(format!("error getting groups for user {user}: {err}")))
        }
    };

    let output = String::from_utf8_lossy(&output);
    Ok(output.split_whitespace().map(str::to_string).collect())
}

fn list_config_files(
    host: &Host,
    skip_intrinsic_ignores: bool,
) -> Result<(Vec<ConfigFileState>, Vec<IgnoredConfig>)> {
    let output = host
        .runner
        .run("", "apk audit")
        .map_err(|e| Error::Other(format!("error running apk audit: {e}")))?;
    let output = String::from_utf8_lossy(&output);

    let mut configs = Vec::new();
    let mut ignored = Vec::new();
    let mut modified_files = Vec::new();

    'lines: for line in output.lines() {
        let line = line.trim();
        if line.len() < 2 {
            continue;
        }

        let status = &line[..1];
        let mut path = line[1..].trim().to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        // Only /etc is under management.
        if !path.starts_with("/etc") {
            continue;
        }

        if let Some(reason) = intrinsic_ignore_reason(&path) {
            if !skip_intrinsic_ignores {
                ignored.push(IgnoredConfig { path, reason });
            }
            continue 'lines;
        }

        if status != "X" {
            let meta = host.fs.metadata(Path::new(&path))?;
            if meta.is_dir {
                if !skip_intrinsic_ignores {
                    ignored.push(IgnoredConfig {
                        path,
                        reason: "intrinsic: directory".to_string(),
                    });
                }
                continue;
            }
        }

        let mut config = ConfigFileState {
            path: path.clone(),
            ..Default::default()
        };
        match status {
            "A" => config.origin = FileOrigin::UserCreated,
            "U" => {
                config.origin = FileOrigin::PackageModified;
                modified_files.push(path);
            }
            "X" => config.deleted = true,
            _ => {}
        }

        configs.push(config);
    }

    if !modified_files.is_empty() {
        let owners = package_owners(host.runner, &modified_files);
        for config in &mut configs {
            if let Some(owner) = owners.get(&config.path) {
                config.origin_package = owner.clone();
            }
        }
    }

    for config in &mut configs {
        if config.deleted {
            continue;
        }
        let path = Path::new(&config.path);
        let content = host.fs.read(path)?;
        config.content = String::from_utf8_lossy(&content).into_owned();

        let meta = host.fs.metadata(path)?;
        config.mode = format!("0{:03o}", meta.mode);
        config.owner = meta.owner;
        config.group = meta.group;
    }

    Ok((configs, ignored))
}

/// Batch-resolve owning packages for modified files. Lookup failures are
/// tolerated; files nobody owns simply stay unattributed.
fn package_owners(runner: &dyn CommandRunner, files: &[String]) -> HashMap<String, String> {
    let command = format!("apk info --who-owns {}", files.join(" "));
    let output = runner.run("", &command).unwrap_or_default();
    let output = String::from_utf8_lossy(&output);

    let mut owners = HashMap::new();
    for line in output.lines() {
        if let Some((path, owner)) = line.split_once(" is owned by ") {
            owners.insert(path.trim().to_string(), owner.trim().to_string());
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFs;
    use crate::testutil::MockRunner;

    fn seeded_fs() -> MemFs {
        let fs = MemFs::new();
        fs.add_file(WORLD_PATH, "alpine-base\nhtop\n\n");
        fs.add_file(PASSWD_PATH, concat!(
            "root:x:0:0:root:/root:/bin/ash\n",
            "daemon:x:2:2:daemon:/sbin:/sbin/nologin\n",
            "alice:x:1000:1000:alice:/home/alice:/bin/ash\n",
            "svc:x:1001:1001::/home/svc:/sbin/nologin\n",
        ));
        fs.add_file(GROUP_PATH, "root:x:0:\nwheel:x:10:alice\nalice:x:1000:\n");
        fs.add_dir(SERVICES_DIR);
        fs
    }

    #[test]
    fn test_infer_packages_from_world_file() {
        let fs = seeded_fs();
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice wheel");
        let host = Host::new(&runner, &fs);

        let (state, _) = infer_system_state(&host, false).unwrap();
        let names: Vec<&str> = state.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpine-base", "htop"]);
    }

    #[test]
    fn test_infer_services_with_runlevels() {
        let fs = seeded_fs();
        fs.add_file("/etc/init.d/sshd", "");
        fs.add_file("/etc/init.d/crond", "");
        fs.add_file("/etc/init.d/helper.sh", "");
        fs.add_file("/etc/runlevels/default/sshd", "");
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        let host = Host::new(&runner, &fs);

        let (state, _) = infer_system_state(&host, false).unwrap();
        let sshd = state.services.iter().find(|s| s.name == "sshd").unwrap();
        assert!(sshd.enabled);
        assert_eq!(sshd.runlevel, "default");

        let crond = state.services.iter().find(|s| s.name == "crond").unwrap();
        assert!(!crond.enabled);
        assert_eq!(crond.runlevel, "");

        assert!(!state.services.iter().any(|s| s.name == "helper.sh"));
    }

    #[test]
    fn test_infer_service_first_runlevel_hit_wins() {
        let fs = seeded_fs();
        fs.add_file("/etc/init.d/sshd", "");
        fs.add_file("/etc/runlevels/boot/sshd", "");
        fs.add_file("/etc/runlevels/default/sshd", "");
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        let host = Host::new(&runner, &fs);

        let (state, _) = infer_system_state(&host, false).unwrap();
        assert_eq!(state.services[0].runlevel, "boot");
    }

    #[test]
    fn test_infer_users_filters_system_accounts() {
        let fs = seeded_fs();
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice wheel docker");
        let host = Host::new(&runner, &fs);

        let (state, _) = infer_system_state(&host, false).unwrap();
        assert_eq!(state.users.len(), 1);
        let alice = &state.users[0];
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.groups, vec!["alice", "wheel", "docker"]);
        assert_eq!(alice.primary_group, "alice");
    }

    #[test]
    fn test_infer_users_no_such_user_yields_empty_groups() {
        let fs = seeded_fs();
        let runner = MockRunner::new();
        runner.fail("", "groups alice", "groups: unknown user: no such user alice");
        let host = Host::new(&runner, &fs);

        let (state, _) = infer_system_state(&host, false).unwrap();
        assert_eq!(state.users[0].groups, Vec::<String>::new());
    }

    #[test]
    fn test_infer_configs_from_audit() {
        let fs = seeded_fs();
        fs.add_file_with("/etc/motd", "welcome\n", 0o644, "root", "root");
        fs.add_file_with("/etc/ssh/sshd_config", "PermitRootLogin no\n", 0o600, "root", "root");
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        runner.respond("", "apk audit", b"A  etc/motd\nU  etc/ssh/sshd_config\nX  etc/issue\n");
        runner.respond(
            "",
            "apk info --who-owns /etc/ssh/sshd_config",
            b"/etc/ssh/sshd_config is owned by openssh-server-9.6_p1-r0\n",
        );
        let host = Host::new(&runner, &fs);

        let (state, _) = infer_system_state(&host, false).unwrap();
        assert_eq!(state.configs.len(), 3);

        let motd = state.configs.iter().find(|c| c.path == "/etc/motd").unwrap();
        assert_eq!(motd.origin, FileOrigin::UserCreated);
        assert_eq!(motd.content, "welcome\n");
        assert_eq!(motd.mode, "0644");
        assert_eq!(motd.owner, "root");

        let sshd = state.configs.iter().find(|c| c.path == "/etc/ssh/sshd_config").unwrap();
        assert_eq!(sshd.origin, FileOrigin::PackageModified);
        assert_eq!(sshd.origin_package, "openssh-server-9.6_p1-r0");
        assert_eq!(sshd.mode, "0600");

        let issue = state.configs.iter().find(|c| c.path == "/etc/issue").unwrap();
        assert!(issue.deleted);
        assert!(issue.content.is_empty());
    }

    #[test]
    fn test_infer_configs_intrinsic_ignores_recorded() {
        let fs = seeded_fs();
        fs.add_file("/etc/hostname", "box\n");
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        runner.respond(
            "",
            "apk audit",
            b"U  etc/passwd\nA  etc/runlevels/default/local\nA  etc/hostname\nA  etc/profile.bak\n",
        );
        let host = Host::new(&runner, &fs);

        let (state, ignored) = infer_system_state(&host, false).unwrap();
        assert_eq!(state.configs.len(), 1);
        assert_eq!(state.configs[0].path, "/etc/hostname");

        let reasons: Vec<&str> = ignored.iter().map(|i| i.reason.as_str()).collect();
        assert!(reasons.contains(&"intrinsic: /etc/passwd"));
        assert!(reasons.contains(&"intrinsic: runlevel files"));
        assert!(reasons.contains(&"intrinsic: backup file"));
    }

    #[test]
    fn test_infer_configs_outside_etc_skipped() {
        let fs = seeded_fs();
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        runner.respond("", "apk audit", b"A  usr/local/bin/tool\n");
        let host = Host::new(&runner, &fs);

        let (state, ignored) = infer_system_state(&host, false).unwrap();
        assert!(state.configs.is_empty());
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_infer_configs_directory_skipped() {
        let fs = seeded_fs();
        fs.add_dir("/etc/conf.d");
        fs.add_file("/etc/conf.d/keep", "");
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        runner.respond("", "apk audit", b"A  etc/conf.d\n");
        let host = Host::new(&runner, &fs);

        let (state, ignored) = infer_system_state(&host, false).unwrap();
        assert!(state.configs.is_empty());
        assert_eq!(ignored[0].reason, "intrinsic: directory");
    }

    #[test]
    fn test_infer_skip_flag_suppresses_ignore_records() {
        let fs = seeded_fs();
        let runner = MockRunner::new();
        runner.respond("", "groups alice", b"alice");
        runner.respond("", "apk audit", b"U  etc/passwd\n");
        let host = Host::new(&runner, &fs);

        let (state, ignored) = infer_system_state(&host, true).unwrap();
        assert!(state.configs.is_empty());
        assert!(ignored.is_empty());
    }
}
