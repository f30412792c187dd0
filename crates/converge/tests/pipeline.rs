//! End-to-end scenarios over the whole pipeline: compose a document,
//! infer the current state from a seeded in-memory system, diff, and
//! apply or preview through the public API.

mod common;

use std::path::Path;

use common::StubRunner;
use converge::{
    calculate_plan, execute_plan, infer_system_state, load_config, plan_entries, Filesystem, Host,
    MemFs,
};

/// A minimal but complete Alpine-shaped filesystem.
fn base_fs() -> MemFs {
    let fs = MemFs::new();
    fs.add_file("/etc/apk/world", "");
    fs.add_file("/etc/passwd", "root:x:0:0:root:/root:/bin/ash\n");
    fs.add_file("/etc/group", "root:x:0:\nwheel:x:10:\n");
    fs.add_dir("/etc/init.d");
    fs
}

fn base_runner() -> StubRunner {
    let runner = StubRunner::new();
    runner.respond("", "apk audit", b"");
    runner.respond("", "sh -c 'cat /etc/group'", b"root:x:0:\nwheel:x:10:\n");
    runner
}

fn sorted_descriptions(entries: &[converge::PlanEntry]) -> Vec<String> {
    let mut descriptions: Vec<String> = entries.iter().map(|e| e.description.clone()).collect();
    descriptions.sort();
    descriptions
}

#[test]
fn scenario_create_file_and_install_package() {
    let fs = base_fs();
    fs.add_file(
        "/config/system.yaml",
        "packages:\n  - name: htop\nconfigs:\n  - path: /etc/motd\n    content: \"Hello\\n\"\n",
    );
    let runner = base_runner();
    let host = Host::new(&runner, &fs);

    let desired = load_config(Path::new("/config/system.yaml"), &host).unwrap();
    let (current, _) = infer_system_state(&host, false).unwrap();
    let mut plan = calculate_plan(&desired, &current, &host, false).unwrap();

    let descriptions: Vec<String> = plan.iter().map(|a| a.description()).collect();
    assert_eq!(descriptions, vec!["Install package htop", "Create file /etc/motd"]);

    execute_plan(&mut plan, &host).unwrap();
    assert!(runner.ran("apk add htop"));
    assert_eq!(fs.read(Path::new("/etc/motd")).unwrap(), b"Hello\n");
}

#[test]
fn scenario_audit_added_file_matching_desired_is_converged() {
    let fs = base_fs();
    fs.add_file("/etc/motd", "Hello from cairn!");
    fs.add_file(
        "/config/system.yaml",
        "configs:\n  - path: /etc/motd\n    content: Hello from cairn!\n",
    );
    let runner = base_runner();
    runner.respond("", "apk audit", b"A  etc/motd\n");
    let host = Host::new(&runner, &fs);

    let desired = load_config(Path::new("/config/system.yaml"), &host).unwrap();
    let (current, _) = infer_system_state(&host, false).unwrap();
    let plan = calculate_plan(&desired, &current, &host, false).unwrap();

    assert!(plan.is_empty(), "matching content must produce no actions");
}

#[test]
fn scenario_dry_run_emits_plan_without_mutations() {
    let fs = base_fs();
    fs.add_file("/config/system.yaml", "packages:\n  - name: htop\n");
    let runner = base_runner();
    let host = Host::new(&runner, &fs);

    let desired = load_config(Path::new("/config/system.yaml"), &host).unwrap();
    let (current, _) = infer_system_state(&host, false).unwrap();
    let plan = calculate_plan(&desired, &current, &host, false).unwrap();

    let entries = plan_entries(&plan);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].description, "Install package htop");
    assert_eq!(entries[0].details, vec!["run: apk add htop"]);

    // Only inference and diff touched the runner; nothing was applied.
    assert!(runner.ran("apk audit"));
    assert!(runner.ran("sh -c 'cat /etc/group'"));
    assert!(!runner.ran("apk add htop"));
}

#[test]
fn scenario_user_package_diff() {
    let fs = base_fs();
    fs.add_file(
        "/etc/passwd",
        "root:x:0:0:root:/root:/bin/ash\ntestuser:x:1000:1000::/home/testuser:/bin/ash\n",
    );
    fs.add_file("/etc/group", "root:x:0:\nwheel:x:10:\ntestuser:x:1000:\n");
    fs.add_file(
        "/config/system.yaml",
        concat!(
            "packages:\n  - name: pipx\n",
            "users:\n  - name: testuser\n",
            "user-packages:\n  - user: testuser\n    pipx: [ruff]\n",
        ),
    );
    let runner = base_runner();
    runner.respond("", "sh -c 'cat /etc/group'", b"root:x:0:\nwheel:x:10:\ntestuser:x:1000:\n");
    runner.respond("", "groups testuser", b"testuser");
    runner.respond(
        "testuser",
        "pipx list --json",
        br#"{"venvs":{"black":{"metadata":{"package":"black"}}}}"#,
    );
    let host = Host::new(&runner, &fs);

    let desired = load_config(Path::new("/config/system.yaml"), &host).unwrap();
    let (current, _) = infer_system_state(&host, false).unwrap();
    let plan = calculate_plan(&desired, &current, &host, false).unwrap();

    assert_eq!(
        sorted_descriptions(&plan_entries(&plan)),
        vec![
            "Ensure user package 'black' for user 'testuser' managed by 'pipx' is absent",
            "Ensure user package 'ruff' for user 'testuser' managed by 'pipx' is present",
            "Install package pipx",
        ]
    );
}

#[test]
fn scenario_transactional_rollback_on_apply_failure() {
    let fs = base_fs();
    let runner = base_runner();
    runner.fail("", "apk add vim", "ERROR: unable to select packages: vim");
    let host = Host::new(&runner, &fs);

    let mut plan = vec![
        converge::Action::PackageInstall(converge::action::PackageInstall {
            package: "pipx".to_string(),
        }),
        converge::Action::FileCreate(converge::action::FileCreate {
            path: "/etc/rollback_test.conf".to_string(),
            content: "x".to_string(),
            mode: "0644".to_string(),
            owner: String::new(),
            group: String::new(),
        }),
        converge::Action::PackageInstall(converge::action::PackageInstall {
            package: "vim".to_string(),
        }),
    ];

    let err = execute_plan(&mut plan, &host).unwrap_err();
    assert!(err.to_string().contains("unable to select packages"));

    assert!(!fs.exists(Path::new("/etc/rollback_test.conf")));
    assert_eq!(
        runner.commands(),
        vec!["apk add pipx", "apk add vim", "apk del pipx"]
    );
}

#[test]
fn scenario_intrinsic_config_rejected_at_load() {
    let fs = base_fs();
    fs.add_file(
        "/config/system.yaml",
        "configs:\n  - path: /etc/passwd\n    content: \"root:x:0:0::/root:/bin/ash\\n\"\n",
    );
    let runner = base_runner();
    let host = Host::new(&runner, &fs);

    let err = load_config(Path::new("/config/system.yaml"), &host).unwrap_err();
    assert!(err.to_string().contains("intrinsically ignored"));
}

#[test]
fn scenario_idempotent_apply_of_converged_system() {
    let fs = base_fs();
    fs.add_file("/etc/apk/world", "htop\n");
    fs.add_file("/etc/init.d/sshd", "");
    fs.add_file("/etc/runlevels/default/sshd", "");
    fs.add_file(
        "/config/system.yaml",
        concat!(
            "packages:\n  - name: htop\n",
            "services:\n  - name: sshd\n    enabled: true\n    runlevel: default\n",
        ),
    );
    let runner = base_runner();
    let host = Host::new(&runner, &fs);

    let desired = load_config(Path::new("/config/system.yaml"), &host).unwrap();
    let (current, _) = infer_system_state(&host, false).unwrap();
    let mut plan = calculate_plan(&desired, &current, &host, false).unwrap();
    assert!(plan.is_empty());

    execute_plan(&mut plan, &host).unwrap();
    assert_eq!(runner.commands(), vec!["apk audit", "sh -c 'cat /etc/group'"]);
}
