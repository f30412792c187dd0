//! Filesystem boundary.
//!
//! All file access goes through the [`Filesystem`] trait so the engine
//! can run against the real root filesystem ([`OsFs`]) or an in-memory
//! stand-in ([`MemFs`]) in tests. Owner and group resolution lives here
//! too: the engine only ever speaks in user/group names, and the real
//! backend translates them to uids/gids.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File metadata as the engine needs it: kind, permission bits, and
/// resolved owner/group names (numeric fallback when unresolvable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub is_dir: bool,
    pub mode: u32,
    pub owner: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait Filesystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    /// Write `content`, creating the file with `mode` or truncating an
    /// existing one and resetting its permission bits to `mode`.
    fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()>;
    fn metadata(&self, path: &Path) -> Result<FileMeta>;
    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
    /// Change ownership by name; `None` keeps the corresponding side.
    fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<()>;
    fn remove(&self, path: &Path) -> Result<()>;
    fn remove_all(&self, path: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// List the entries of a directory, sorted by name.
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;
    fn exists(&self, path: &Path) -> bool;
    /// Create a fresh scratch directory whose name starts with `prefix`.
    fn temp_dir(&self, prefix: &str) -> Result<PathBuf>;
}

// ============================================================================
// Live filesystem
// ============================================================================

/// Backend over the host filesystem, with uid/gid resolution via the
/// system databases.
pub struct OsFs;

impl OsFs {
    fn resolve_owner(uid: u32) -> String {
        match nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid)) {
            Ok(Some(user)) => user.name,
            _ => uid.to_string(),
        }
    }

    fn resolve_group(gid: u32) -> String {
        match nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid)) {
            Ok(Some(group)) => group.name,
            _ => gid.to_string(),
        }
    }
}

impl Filesystem for OsFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| Error::io(path, e))
    }

    fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, content).map_err(|e| Error::io(path, e))?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| Error::io(path, e))
    }

    fn metadata(&self, path: &Path) -> Result<FileMeta> {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let meta = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
        Ok(FileMeta {
            is_dir: meta.is_dir(),
            mode: meta.permissions().mode() & 0o777,
            owner: Self::resolve_owner(meta.uid()),
            group: Self::resolve_group(meta.gid()),
        })
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| Error::io(path, e))
    }

    fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<()> {
        let uid = match owner {
            Some(name) => Some(
                nix::unistd::User::from_name(name)
                    .map_err(|e| Error::Other(format!("user lookup for '{name}' failed: {e}")))?
                    .ok_or_else(|| Error::Other(format!("unknown user '{name}'")))?
                    .uid,
            ),
            None => None,
        };
        let gid = match group {
            Some(name) => Some(
                nix::unistd::Group::from_name(name)
                    .map_err(|e| Error::Other(format!("group lookup for '{name}' failed: {e}")))?
                    .ok_or_else(|| Error::Other(format!("unknown group '{name}'")))?
                    .gid,
            ),
            None => None,
        };
        nix::unistd::chown(path, uid, gid)
            .map_err(|e| Error::io(path, io::Error::from_raw_os_error(e as i32)))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| Error::io(path, e))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to).map_err(|e| Error::io(from, e))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path).map_err(|e| Error::io(path, e))? {
            let entry = entry.map_err(|e| Error::io(path, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        Ok(dir.into_path())
    }
}

// ============================================================================
// In-memory filesystem
// ============================================================================

#[derive(Debug, Clone)]
struct MemFile {
    content: Vec<u8>,
    mode: u32,
    owner: String,
    group: String,
}

#[derive(Debug, Default)]
struct MemInner {
    files: HashMap<PathBuf, MemFile>,
    dirs: HashSet<PathBuf>,
    temp_seq: u32,
}

/// HashMap-backed filesystem. Directories exist either explicitly (via
/// [`MemFs::add_dir`] or `temp_dir`) or implicitly as ancestors of known
/// entries. Ownership changes are recorded without consulting any user
/// database, which keeps action tests free of host state.
#[derive(Debug, Default)]
pub struct MemFs {
    inner: RefCell<MemInner>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file with content, mode `0644`, owned by `root:root`.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) {
        self.add_file_with(path, content, 0o644, "root", "root");
    }

    pub fn add_file_with(
        &self,
        path: impl Into<PathBuf>,
        content: impl AsRef<[u8]>,
        mode: u32,
        owner: &str,
        group: &str,
    ) {
        self.inner.borrow_mut().files.insert(
            path.into(),
            MemFile {
                content: content.as_ref().to_vec(),
                mode,
                owner: owner.to_string(),
                group: group.to_string(),
            },
        );
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.inner.borrow_mut().dirs.insert(path.into());
    }

    fn is_dir(&self, path: &Path) -> bool {
        let inner = self.inner.borrow();
        if inner.dirs.contains(path) {
            return true;
        }
        inner
            .files
            .keys()
            .chain(inner.dirs.iter())
            .any(|p| p.starts_with(path) && p != path)
    }

    fn not_found(path: &Path) -> Error {
        Error::io(path, io::Error::new(io::ErrorKind::NotFound, "no such file or directory"))
    }
}

impl Filesystem for MemFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner
            .borrow()
            .files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        match inner.files.get_mut(path) {
            Some(file) => {
                file.content = content.to_vec();
                file.mode = mode;
            }
            None => {
                inner.files.insert(
                    path.to_path_buf(),
                    MemFile {
                        content: content.to_vec(),
                        mode,
                        owner: "root".to_string(),
                        group: "root".to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    fn metadata(&self, path: &Path) -> Result<FileMeta> {
        if let Some(file) = self.inner.borrow().files.get(path) {
            return Ok(FileMeta {
                is_dir: false,
                mode: file.mode,
                owner: file.owner.clone(),
                group: file.group.clone(),
            });
        }
        if self.is_dir(path) {
            return Ok(FileMeta {
                is_dir: true,
                mode: 0o755,
                owner: "root".to_string(),
                group: "root".to_string(),
            });
        }
        Err(Self::not_found(path))
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let file = inner.files.get_mut(path).ok_or_else(|| Self::not_found(path))?;
        file.mode = mode;
        Ok(())
    }

    fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let file = inner.files.get_mut(path).ok_or_else(|| Self::not_found(path))?;
        if let Some(owner) = owner {
            file.owner = owner.to_string();
        }
        if let Some(group) = group {
            file.group = group.to_string();
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.inner
            .borrow_mut()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.files.retain(|p, _| !p.starts_with(path));
        inner.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let file = inner.files.remove(from).ok_or_else(|| Self::not_found(from))?;
        inner.files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        if !self.is_dir(path) {
            return Err(Self::not_found(path));
        }
        let inner = self.inner.borrow();
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        for known in inner.files.keys().map(|p| (p, false)).chain(inner.dirs.iter().map(|p| (p, true))) {
            let (known_path, known_is_dir) = known;
            if let Ok(rest) = known_path.strip_prefix(path) {
                let mut components = rest.components();
                if let Some(first) = components.next() {
                    let name = first.as_os_str().to_string_lossy().into_owned();
                    // An entry with more components below it is a directory.
                    let is_dir = known_is_dir || components.next().is_some();
                    *children.entry(name).or_insert(false) |= is_dir;
                }
            }
        }
        Ok(children
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.borrow().files.contains_key(path) || self.is_dir(path)
    }

    fn temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        let mut inner = self.inner.borrow_mut();
        inner.temp_seq += 1;
        let dir = PathBuf::from(format!("/tmp/{prefix}{}", inner.temp_seq));
        inner.dirs.insert(dir.clone());
        Ok(dir)
    }
}
