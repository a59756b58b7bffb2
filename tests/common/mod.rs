// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Version used by the packaging tests
pub const VERSION: &str = "1.2.3";

/// A build workspace: a package directory holding a `tsuru` binary and an
/// empty output directory.
///
/// Keep the value alive to prevent cleanup.
pub struct Workspace {
    pub root: TempDir,
    pub package_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let package_dir = root.path().join("dist");
        let output_dir = root.path().join("out");
        fs::create_dir_all(&package_dir).unwrap();
        fs::create_dir_all(&output_dir).unwrap();

        let binary = package_dir.join("tsuru");
        fs::write(&binary, b"#!/bin/sh\necho \"tsuru client\"\n").unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            root,
            package_dir,
            output_dir,
        }
    }

    /// Create an empty directory under the workspace root
    pub fn subdir(&self, name: &str) -> PathBuf {
        let dir = self.root.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}

/// Sorted file names in `dir`
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
