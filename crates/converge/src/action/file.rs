//! Managed file actions.
//!
//! Each kind captures enough original state during `apply` to reverse
//! itself: content, permission bits, and ownership as appropriate.

use std::path::{Path, PathBuf};

use super::parse_octal_mode;
use crate::error::{Error, Result};
use crate::host::Host;

fn nonempty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCreate {
    pub path: String,
    pub content: String,
    pub mode: String,
    pub owner: String,
    pub group: String,
}

impl FileCreate {
    pub fn description(&self) -> String {
        format!("Create file {}", self.path)
    }

    pub fn execution_details(&self) -> Vec<String> {
        let mut details = vec![format!("create file: {} with permissions {}", self.path, self.mode)];
        if !self.owner.is_empty() {
            details.push(format!("set owner to {}", self.owner));
        }
        if !self.group.is_empty() {
            details.push(format!("set group to {}", self.group));
        }
        details
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        log::info!(
            "Creating file {} (owner={} group={} mode={})",
            self.path,
            self.owner,
            self.group,
            self.mode
        );
        let path = Path::new(&self.path);
        host.fs.write(path, self.content.as_bytes(), 0o644)?;
        if !self.mode.is_empty() {
            host.fs.chmod(path, parse_octal_mode(&self.mode)?)?;
        }
        if !self.owner.is_empty() || !self.group.is_empty() {
            host.fs
                .chown(path, nonempty(&self.owner), nonempty(&self.group))?;
        }
        Ok(())
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back creation of file {}", self.path);
        host.fs
            .remove(Path::new(&self.path))
            .inspect_err(|e| log::error!("Failed to roll back creation of file {}: {e}", self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    pub new_content: String,
    orig_content: Option<String>,
    orig_mode: Option<u32>,
}

impl FileUpdate {
    pub fn new(path: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            new_content: new_content.into(),
            orig_content: None,
            orig_mode: None,
        }
    }

    pub fn description(&self) -> String {
        format!("Update file {}", self.path)
    }

    pub fn execution_details(&self) -> Vec<String> {
        let orig = self.orig_content.as_deref().unwrap_or("");
        let diff = similar::TextDiff::from_lines(orig, self.new_content.as_str());
        let mut rendered = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => "-",
                similar::ChangeTag::Insert => "+",
                similar::ChangeTag::Equal => " ",
            };
            rendered.push_str(&format!("{sign}{change}"));
        }
        vec![
            format!("update file: {}", self.path),
            "--- diff ---".to_string(),
            rendered.trim_end().to_string(),
            "--- end diff ---".to_string(),
        ]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        log::info!("Updating file content of {}", self.path);
        let path = Path::new(&self.path);
        let meta = host.fs.metadata(path)?;
        self.orig_mode = Some(meta.mode);
        let content = host.fs.read(path)?;
        self.orig_content = Some(String::from_utf8_lossy(&content).into_owned());
        host.fs
            .write(path, self.new_content.as_bytes(), meta.mode)
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back update of file {}", self.path);
        let content = self.orig_content.clone().unwrap_or_default();
        host.fs
            .write(
                Path::new(&self.path),
                content.as_bytes(),
                self.orig_mode.unwrap_or(0o644),
            )
            .inspect_err(|e| log::error!("Failed to roll back update of file {}: {e}", self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelete {
    pub path: String,
    orig_content: Option<String>,
    orig_mode: Option<u32>,
    orig_owner: Option<String>,
    orig_group: Option<String>,
}

impl FileDelete {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            orig_content: None,
            orig_mode: None,
            orig_owner: None,
            orig_group: None,
        }
    }

    pub fn description(&self) -> String {
        format!("Delete file {}", self.path)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("delete file: {}", self.path)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        log::info!("Deleting file {}", self.path);
        let path = Path::new(&self.path);
        let meta = host.fs.metadata(path)?;
        self.orig_mode = Some(meta.mode);
        self.orig_owner = Some(meta.owner);
        self.orig_group = Some(meta.group);
        let content = host.fs.read(path)?;
        self.orig_content = Some(String::from_utf8_lossy(&content).into_owned());
        host.fs.remove(path)
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back deletion of file {} by restoring content", self.path);
        let path = Path::new(&self.path);
        let content = self.orig_content.clone().unwrap_or_default();
        if let Err(e) = host
            .fs
            .write(path, content.as_bytes(), self.orig_mode.unwrap_or(0o644))
        {
            log::error!("Failed to restore content of {} during rollback: {e}", self.path);
            return Err(e);
        }

        let owner = self.orig_owner.as_deref().and_then(nonempty);
        let group = self.orig_group.as_deref().and_then(nonempty);
        if owner.is_some() || group.is_some() {
            log::info!(
                "Restoring ownership of {} to {}:{}",
                self.path,
                owner.unwrap_or(""),
                group.unwrap_or("")
            );
            if let Err(e) = host.fs.chown(path, owner, group) {
                log::error!("Failed to chown {} during rollback: {e}", self.path);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChmod {
    pub path: String,
    pub mode: String,
    orig_mode: Option<u32>,
}

impl FileChmod {
    pub fn new(path: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            orig_mode: None,
        }
    }

    pub fn description(&self) -> String {
        format!("Chmod file {} to {}", self.path, self.mode)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("chmod file {} to {}", self.path, self.mode)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        log::info!("Changing mode of {} to {}", self.path, self.mode);
        let path = Path::new(&self.path);
        let meta = host.fs.metadata(path)?;
        self.orig_mode = Some(meta.mode);
        host.fs.chmod(path, parse_octal_mode(&self.mode)?)
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        let mode = self.orig_mode.unwrap_or(0o644);
        log::info!("Rolling back mode of {} to 0{mode:03o}", self.path);
        host.fs
            .chmod(Path::new(&self.path), mode)
            .inspect_err(|e| log::error!("Failed to roll back mode of {}: {e}", self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChown {
    pub path: String,
    pub owner: String,
    pub group: String,
    orig_owner: Option<String>,
    orig_group: Option<String>,
}

impl FileChown {
    pub fn new(path: impl Into<String>, owner: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
            group: group.into(),
            orig_owner: None,
            orig_group: None,
        }
    }

    pub fn description(&self) -> String {
        format!("Chown file {} to {}:{}", self.path, self.owner, self.group)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("chown file {} to {}:{}", self.path, self.owner, self.group)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        log::info!("Changing ownership of {} to {}:{}", self.path, self.owner, self.group);
        let path = Path::new(&self.path);
        let meta = host.fs.metadata(path)?;
        self.orig_owner = Some(meta.owner);
        self.orig_group = Some(meta.group);
        host.fs
            .chown(path, nonempty(&self.owner), nonempty(&self.group))
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        let owner = self.orig_owner.as_deref().and_then(nonempty);
        let group = self.orig_group.as_deref().and_then(nonempty);
        log::info!(
            "Rolling back ownership of {} to {}:{}",
            self.path,
            owner.unwrap_or(""),
            group.unwrap_or("")
        );
        host.fs
            .chown(Path::new(&self.path), owner, group)
            .inspect_err(|e| log::error!("Failed to roll back ownership of {}: {e}", self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRevert {
    pub path: String,
    pub owner_package: String,
    modified_content: Option<String>,
}

impl FileRevert {
    pub fn new(path: impl Into<String>, owner_package: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner_package: owner_package.into(),
            modified_content: None,
        }
    }

    pub fn description(&self) -> String {
        format!("Revert file {} to state from package {}", self.path, self.owner_package)
    }

    pub fn execution_details(&self) -> Vec<String> {
        vec![format!("run: apk fix --reinstall {}", self.owner_package)]
    }

    pub fn apply(&mut self, host: &Host) -> Result<()> {
        log::info!("Reverting {} to the version shipped by {}", self.path, self.owner_package);
        let path = Path::new(&self.path);
        let content = host.fs.read(path)?;
        self.modified_content = Some(String::from_utf8_lossy(&content).into_owned());

        // `apk info <pkg>` prints `<pkg>-<version> description:`; the
        // version is everything after the first hyphen up to whitespace.
        // Hyphenated package names mis-parse here, a known limitation.
        let output = host
            .runner
            .run("", &format!("apk info {}", self.owner_package))
            .map_err(|e| {
                Error::Other(format!("could not get package info for {}: {e}", self.owner_package))
            })?;
        let output = String::from_utf8_lossy(&output);
        let version = output
            .split_once('-')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .ok_or_else(|| Error::Other(format!("could not parse package version from: {output}")))?;

        let cached = PathBuf::from(format!("/var/cache/apk/{}-{version}.apk", self.owner_package));
        if !host.fs.exists(&cached) {
            return Err(Error::Other(format!(
                "cached apk not found at {}; run 'apk add --no-cache' to ensure packages are cached",
                cached.display()
            )));
        }
        log::info!("Found cached apk at {}", cached.display());

        let scratch = host.fs.temp_dir("cairn-apk-")?;
        let result = self.extract_and_replace(host, &cached, &scratch);
        // The scratch directory is released on every exit path.
        let _ = host.fs.remove_all(&scratch);
        result
    }

    fn extract_and_replace(&self, host: &Host, cached: &Path, scratch: &Path) -> Result<()> {
        // Archive member paths are relative.
        let relative = self.path.trim_start_matches('/');
        host.runner
            .run(
                "",
                &format!("tar -xzf {} -C {} {relative}", cached.display(), scratch.display()),
            )
            .map_err(|e| Error::Other(format!("could not extract file from package: {e}")))?;
        host.fs.rename(&scratch.join(relative), Path::new(&self.path))
    }

    pub fn rollback(&self, host: &Host) -> Result<()> {
        log::info!("Rolling back revert of file {}", self.path);
        let content = self.modified_content.clone().unwrap_or_default();
        host.fs
            .write(Path::new(&self.path), content.as_bytes(), 0o644)
            .inspect_err(|e| log::error!("Failed to roll back revert of file {}: {e}", self.path))
    }
}
