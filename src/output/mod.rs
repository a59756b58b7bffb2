// src/output/mod.rs
//! OS-native package writers
//!
//! Terminal representations of the conversion graph. Each one knows its
//! conventional file name and how to serialize itself (RPM via the `rpm`
//! crate, DEB as an ar archive of gzipped tarballs).

pub mod deb;
pub mod rpm;

use crate::error::{Error, Result};
use crate::package::{NATIVE_ARCH, Scripts};
use std::fmt;
use std::path::Path;

pub use self::deb::DebPackage;
pub use self::rpm::RpmPackage;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Rpm,
    Deb,
}

impl OutputFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Deb => "deb",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Result of writing a package to disk
#[derive(Debug)]
pub struct GenerationResult {
    /// Size of the generated package in bytes
    pub size: u64,
    /// Number of regular files in the payload
    pub file_count: usize,
}

/// A package that can be written to disk
pub trait OutputPackage {
    /// Format written by [`OutputPackage::output`]
    fn format(&self) -> OutputFormat;

    /// Conventional file name for this package
    fn to_filename(&self) -> String;

    /// Serialize the package to `path`
    fn output(&self, path: &Path) -> Result<GenerationResult>;

    /// Release temporary resources. Safe to call more than once.
    fn cleanup(&mut self) -> Result<()>;
}

/// Modification time stamped into archives
///
/// Honours `SOURCE_DATE_EPOCH` for reproducible output.
pub fn build_timestamp() -> u64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64)
}

/// Fail if `path` already exists, so a previous artifact is never clobbered
pub(crate) fn ensure_absent(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        return Err(Error::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Convert maintainer script fragments to format-specific scripts
pub trait HookConverter {
    /// Generate pre-install script content
    fn pre_install(&self, scripts: &Scripts) -> Option<String>;

    /// Generate post-install script content
    fn post_install(&self, scripts: &Scripts) -> Option<String>;

    /// Generate pre-remove script content
    fn pre_remove(&self, scripts: &Scripts) -> Option<String>;

    /// Generate post-remove script content
    fn post_remove(&self, scripts: &Scripts) -> Option<String>;
}

/// Indent a script body for nesting inside a shell conditional
pub(crate) fn indent(script: &str) -> String {
    script
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Architecture of the build host, in `uname -m` spelling
pub fn native_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i686",
        "arm" => "armv7l",
        other => other,
    }
}

/// Get the architecture string for a format
pub fn arch_for_format(arch: &str, format: OutputFormat) -> String {
    let arch = if arch == NATIVE_ARCH { native_arch() } else { arch };

    match format {
        OutputFormat::Deb => match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "i686" | "i386" => "i386",
            "armv7l" | "armhf" => "armhf",
            "noarch" | "all" => "all",
            _ => arch,
        },
        OutputFormat::Rpm => match arch {
            "amd64" => "x86_64",
            "arm64" => "aarch64",
            "all" | "noarch" => "noarch",
            "armhf" => "armv7hl",
            _ => arch,
        },
    }
    .to_string()
}
