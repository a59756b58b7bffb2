// src/package/staging.rs

//! Temporary install trees owned by package representations
//!
//! Every package representation stages its files in a private temporary
//! directory. Releasing it is explicit through [`Staging::release`], and
//! dropping a `Staging` removes whatever is left.

use crate::error::Result;
use std::fs;
use std::os::unix::fs as unix_fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Prefix of every temporary directory this crate creates
pub const TEMP_PREFIX: &str = "tsuru-packager-";

/// A temporary install tree
#[derive(Debug)]
pub struct Staging {
    dir: Option<TempDir>,
}

impl Staging {
    /// Allocate an empty staging directory under the system temp dir
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}staging-", TEMP_PREFIX))
            .tempdir()?;
        debug!("Allocated staging directory {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    /// Root of the tree, or `None` once released
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Whether the directory has been released
    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Copy the whole tree into a fresh staging directory
    pub fn duplicate(&self) -> Result<Option<Self>> {
        let Some(src) = self.path() else {
            return Ok(None);
        };
        let copy = Self::new()?;
        if let Some(dst) = copy.path() {
            copy_tree(src, dst)?;
        }
        Ok(Some(copy))
    }

    /// Remove the directory. Returns false if it was already released.
    pub fn release(&mut self) -> Result<bool> {
        match self.dir.take() {
            Some(dir) => {
                let path = dir.path().to_path_buf();
                dir.close()?;
                debug!("Removed staging directory {}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Turn an absolute install path into a path relative to a staging root
///
/// Returns `None` for paths that would escape the root.
pub fn relative_install_path(install_path: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for component in Path::new(install_path).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(rel)
}

/// Recursively copy `src` into `dst`, keeping permissions and symlinks
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        copy_entry(entry.path(), &target)?;
    }

    Ok(())
}

/// Copy a single file, directory or symlink to `target`
pub fn copy_entry(source: &Path, target: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(source)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if meta.file_type().is_symlink() {
        let link = fs::read_link(source)?;
        if fs::symlink_metadata(target).is_ok() {
            fs::remove_file(target)?;
        }
        unix_fs::symlink(link, target)?;
    } else if meta.is_dir() {
        fs::create_dir_all(target)?;
        fs::set_permissions(target, fs::Permissions::from_mode(meta.permissions().mode()))?;
    } else {
        // fs::copy carries the permission bits over
        fs::copy(source, target)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_install_path() {
        assert_eq!(
            relative_install_path("/usr/bin/tsuru"),
            Some(PathBuf::from("usr/bin/tsuru"))
        );
        assert_eq!(
            relative_install_path("./etc/default"),
            Some(PathBuf::from("etc/default"))
        );
        assert_eq!(relative_install_path("/usr/../etc/passwd"), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut staging = Staging::new().unwrap();
        let path = staging.path().unwrap().to_path_buf();
        assert!(path.exists());

        assert!(staging.release().unwrap());
        assert!(!path.exists());
        assert!(staging.is_released());
        assert!(!staging.release().unwrap());
    }

    #[test]
    fn test_duplicate_keeps_modes() {
        let staging = Staging::new().unwrap();
        let root = staging.path().unwrap();
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/tool"), b"#!/bin/sh\n").unwrap();
        fs::set_permissions(root.join("usr/bin/tool"), fs::Permissions::from_mode(0o755))
            .unwrap();

        let copy = staging.duplicate().unwrap().unwrap();
        let copied = copy.path().unwrap().join("usr/bin/tool");
        assert_ne!(copy.path(), staging.path());
        assert_eq!(fs::read(&copied).unwrap(), b"#!/bin/sh\n");
        let mode = fs::metadata(&copied).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_drop_removes_directory() {
        let staging = Staging::new().unwrap();
        let path = staging.path().unwrap().to_path_buf();
        drop(staging);
        assert!(!path.exists());
    }
}
