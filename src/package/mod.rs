// src/package/mod.rs

//! Package descriptors and the conversion graph
//!
//! A [`Package`] is the generic "directory" representation: metadata,
//! maintainer script fragments and a staged install tree. Other
//! representations (service-wrapped, RPM, DEB) wrap a `Package` and are
//! reached through [`PackageKind::convert`], which always works on a deep
//! copy so every representation owns its own temporary files.

pub mod staging;

use crate::error::{Error, Result};
use staging::{Staging, copy_entry, copy_tree, relative_install_path};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Architecture placeholder resolved to the build host's architecture
pub const NATIVE_ARCH: &str = "native";

/// Package metadata shared by every representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    /// Package release (RPM `Release`, DEB revision)
    pub iteration: Option<String>,
    pub epoch: Option<u32>,
    pub maintainer: String,
    pub vendor: Option<String>,
    pub url: Option<String>,
    pub description: String,
    pub license: String,
    pub architecture: String,
    pub category: String,
}

impl Metadata {
    /// Metadata with placeholder values for everything but the name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0".to_string(),
            iteration: None,
            epoch: None,
            maintainer: "Unknown <unknown@unknown.org>".to_string(),
            vendor: None,
            url: None,
            description: "no description given".to_string(),
            license: "unknown".to_string(),
            architecture: NATIVE_ARCH.to_string(),
            category: "default".to_string(),
        }
    }

    /// First non-empty line of the description
    pub fn summary(&self) -> &str {
        self.description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Maintainer script fragments, run by the target package manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    pub before_install: Option<String>,
    pub after_install: Option<String>,
    pub before_remove: Option<String>,
    pub after_remove: Option<String>,
}

impl Scripts {
    /// Append a line to a script slot, creating it if empty
    pub fn append(slot: &mut Option<String>, line: &str) {
        match slot {
            Some(existing) => {
                if !existing.ends_with('\n') {
                    existing.push('\n');
                }
                existing.push_str(line);
            }
            None => *slot = Some(line.to_string()),
        }
    }
}

/// File types in a staged tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Symlink,
    Directory,
}

/// A staged file, as it will be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Installation path (absolute)
    pub path: String,
    /// Unix permission bits
    pub mode: u32,
    /// File size in bytes
    pub size: u64,
    pub file_type: FileType,
    /// Symlink target (if type is symlink)
    pub target: Option<String>,
    /// Location of the content inside the staging directory
    pub source: PathBuf,
}

/// One `source=destination` input registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMapping {
    pub source: PathBuf,
    pub destination: String,
}

impl InputMapping {
    /// Parse `source=destination`, or a bare `source` installed at its own path
    pub fn parse(spec: &str) -> Result<Self> {
        let (source, destination) = match spec.split_once('=') {
            Some((src, dest)) => (src, dest.to_string()),
            None => (spec, format!("/{}", spec.trim_start_matches('/'))),
        };

        if source.is_empty() || destination.is_empty() {
            return Err(Error::InvalidInput(spec.to_string()));
        }

        Ok(Self {
            source: PathBuf::from(source),
            destination,
        })
    }

    /// Absolute install path of the source itself
    ///
    /// A destination ending in `/` is a directory the source is placed in.
    pub fn install_path(&self) -> Result<String> {
        let path = if self.destination.ends_with('/') {
            let base = self
                .source
                .file_name()
                .ok_or_else(|| Error::InvalidInput(self.source.display().to_string()))?;
            format!("{}{}", self.destination, base.to_string_lossy())
        } else {
            self.destination.clone()
        };

        if path.starts_with('/') {
            Ok(path)
        } else {
            Ok(format!("/{}", path))
        }
    }
}

/// The generic package representation
#[derive(Debug)]
pub struct Package {
    pub metadata: Metadata,
    pub scripts: Scripts,
    staging: Staging,
}

impl Package {
    /// Create an empty package with its own staging directory
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            metadata: Metadata::new(name),
            scripts: Scripts::default(),
            staging: Staging::new()?,
        })
    }

    /// Root of the staged install tree
    pub fn staging_path(&self) -> Result<&Path> {
        self.staging
            .path()
            .ok_or_else(|| Error::CleanedUp(self.metadata.name.clone()))
    }

    /// Register an input (`source=destination`) and stage its content
    ///
    /// A symlinked source is staged as the file it points to. Symlinks
    /// inside a directory source are staged as symlinks.
    pub fn input(&mut self, spec: &str) -> Result<()> {
        let mapping = InputMapping::parse(spec)?;
        if fs::metadata(&mapping.source).is_err() {
            return Err(Error::InputNotFound(mapping.source));
        }

        let install_path = mapping.install_path()?;
        let rel = relative_install_path(&install_path)
            .ok_or_else(|| Error::InvalidInput(spec.to_string()))?;
        let target = self.staging_path()?.join(rel);

        if mapping.source.is_dir() {
            copy_tree(&mapping.source, &target)?;
        } else {
            copy_entry(&fs::canonicalize(&mapping.source)?, &target)?;
        }

        info!(
            "Added input {} as {}",
            mapping.source.display(),
            install_path
        );
        Ok(())
    }

    /// Write a file into the staged tree
    pub fn add_file(&mut self, install_path: &str, content: &[u8], mode: u32) -> Result<()> {
        let rel = relative_install_path(install_path)
            .ok_or_else(|| Error::InvalidInput(install_path.to_string()))?;
        let target = self.staging_path()?.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        debug!("Staged {} ({:o})", install_path, mode);
        Ok(())
    }

    /// All staged entries, sorted by install path
    pub fn files(&self) -> Result<Vec<FileEntry>> {
        let root = self.staging_path()?;
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            let meta = entry.path().symlink_metadata()?;
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let path = format!("/{}", rel.to_string_lossy());

            let (file_type, target, size) = if meta.file_type().is_symlink() {
                let link = fs::read_link(entry.path())?;
                (
                    FileType::Symlink,
                    Some(link.to_string_lossy().to_string()),
                    0,
                )
            } else if meta.is_dir() {
                (FileType::Directory, None, 0)
            } else {
                (FileType::Regular, None, meta.len())
            };

            files.push(FileEntry {
                path,
                mode: meta.permissions().mode() & 0o7777,
                size,
                file_type,
                target,
                source: entry.path().to_path_buf(),
            });
        }

        Ok(files)
    }

    /// Sum of regular file sizes
    pub fn installed_size(&self) -> Result<u64> {
        Ok(self
            .files()?
            .iter()
            .filter(|f| f.file_type == FileType::Regular)
            .map(|f| f.size)
            .sum())
    }

    /// Deep copy with a fresh staging directory
    pub fn duplicate(&self) -> Result<Self> {
        let staging = self
            .staging
            .duplicate()?
            .ok_or_else(|| Error::CleanedUp(self.metadata.name.clone()))?;
        Ok(Self {
            metadata: self.metadata.clone(),
            scripts: self.scripts.clone(),
            staging,
        })
    }

    /// Release the staging directory. Safe to call more than once.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.staging.release()? {
            debug!("Cleaned up package {}", self.metadata.name);
        }
        Ok(())
    }

    /// Whether [`Package::cleanup`] already ran
    pub fn is_cleaned_up(&self) -> bool {
        self.staging.is_released()
    }
}

/// A representation in the conversion graph
pub trait PackageKind: Sized {
    /// Short name of the representation, used in logs
    const KIND: &'static str;

    /// Build this representation from a package it takes ownership of
    fn from_package(package: Package) -> Result<Self>;

    /// The wrapped generic package
    fn package(&self) -> &Package;

    /// Mutable access to the wrapped generic package
    fn package_mut(&mut self) -> &mut Package;

    /// Convert into another representation, leaving `self` untouched
    fn convert<T: PackageKind>(&self) -> Result<T> {
        let copy = self.package().duplicate()?;
        debug!(
            "Converting {} from {} to {}",
            copy.metadata.name,
            Self::KIND,
            T::KIND
        );
        T::from_package(copy)
    }
}

impl PackageKind for Package {
    const KIND: &'static str = "dir";

    fn from_package(package: Package) -> Result<Self> {
        Ok(package)
    }

    fn package(&self) -> &Package {
        self
    }

    fn package_mut(&mut self) -> &mut Package {
        self
    }
}
