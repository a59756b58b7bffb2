// src/inspect.rs

//! Read back generated packages
//!
//! Used to check what a produced artifact actually declares and installs,
//! independently of the code that wrote it.

use crate::error::{Error, Result};
use crate::output::OutputFormat;
use crate::output::deb::read_member;
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Metadata and payload listing of a package file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedPackage {
    pub format: OutputFormat,
    pub name: String,
    pub version: String,
    pub release: Option<String>,
    pub architecture: String,
    pub maintainer: Option<String>,
    pub vendor: Option<String>,
    pub url: Option<String>,
    pub description: String,
    /// Installed paths of regular files and symlinks, sorted
    pub files: Vec<String>,
    /// Symlink targets keyed by installed path
    pub links: BTreeMap<String, String>,
    /// Maintainer scripts keyed by lifecycle phase
    pub scripts: BTreeMap<String, String>,
}

impl InspectedPackage {
    /// Whether the package installs `path`
    pub fn installs(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }
}

/// Detect package format from file extension and magic bytes
pub fn detect_format(path: &Path) -> Result<OutputFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rpm") => return Ok(OutputFormat::Rpm),
        Some("deb") => return Ok(OutputFormat::Deb),
        _ => {}
    }

    let mut file = File::open(path)?;
    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;

    // RPM magic: 0xED 0xAB 0xEE 0xDB (first 4 bytes)
    if magic[0..4] == [0xED, 0xAB, 0xEE, 0xDB] {
        return Ok(OutputFormat::Rpm);
    }

    // DEB magic: "!<arch>\n" (ar archive format)
    if magic[0..8] == *b"!<arch>\n" {
        return Ok(OutputFormat::Deb);
    }

    Err(Error::UnknownFormat(path.to_path_buf()))
}

/// Inspect a package file of either format
pub fn inspect(path: &Path) -> Result<InspectedPackage> {
    match detect_format(path)? {
        OutputFormat::Rpm => inspect_rpm(path),
        OutputFormat::Deb => inspect_deb(path),
    }
}

/// Inspect an RPM package
pub fn inspect_rpm(path: &Path) -> Result<InspectedPackage> {
    debug!("Inspecting RPM package: {}", path.display());
    let pkg = rpm::Package::open(path)?;
    let meta = &pkg.metadata;

    let mut files = Vec::new();
    let mut links = BTreeMap::new();
    for entry in meta.get_file_entries()? {
        let path = entry.path.to_string_lossy().to_string();
        if !entry.linkto.is_empty() {
            links.insert(path.clone(), entry.linkto);
        }
        files.push(path);
    }
    files.sort();

    let mut scripts = BTreeMap::new();
    let phases = [
        ("pre-install", meta.get_pre_install_script()),
        ("post-install", meta.get_post_install_script()),
        ("pre-remove", meta.get_pre_uninstall_script()),
        ("post-remove", meta.get_post_uninstall_script()),
    ];
    for (phase, script) in phases {
        if let Ok(script) = script
            && !script.script.is_empty()
        {
            scripts.insert(phase.to_string(), script.script);
        }
    }

    Ok(InspectedPackage {
        format: OutputFormat::Rpm,
        name: meta.get_name()?.to_string(),
        version: meta.get_version()?.to_string(),
        release: meta.get_release().ok().map(str::to_string),
        architecture: meta.get_arch()?.to_string(),
        maintainer: meta.get_packager().ok().map(str::to_string),
        vendor: meta.get_vendor().ok().map(str::to_string),
        url: meta.get_url().ok().map(str::to_string),
        description: meta.get_description()?.to_string(),
        files,
        links,
        scripts,
    })
}

/// Inspect a DEB package
pub fn inspect_deb(path: &Path) -> Result<InspectedPackage> {
    debug!("Inspecting DEB package: {}", path.display());

    let control_tar = read_member(path, "control.tar.gz")?
        .ok_or_else(|| Error::malformed("deb", "missing control.tar.gz"))?;
    let data_tar = read_member(path, "data.tar.gz")?
        .ok_or_else(|| Error::malformed("deb", "missing data.tar.gz"))?;

    let mut control = None;
    let mut scripts = BTreeMap::new();
    let mut archive = tar::Archive::new(GzDecoder::new(&control_tar[..]));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry_name(&entry)?;
        let phase = match name.as_str() {
            "control" => {
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                control = Some(content);
                continue;
            }
            "preinst" => "pre-install",
            "postinst" => "post-install",
            "prerm" => "pre-remove",
            "postrm" => "post-remove",
            _ => continue,
        };
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        scripts.insert(phase.to_string(), content);
    }

    let control = control.ok_or_else(|| Error::malformed("deb", "missing control file"))?;
    let fields = parse_control(&control);
    let field = |key: &str| fields.get(key).cloned();

    let mut files = Vec::new();
    let mut links = BTreeMap::new();
    let mut archive = tar::Archive::new(GzDecoder::new(&data_tar[..]));
    for entry in archive.entries()? {
        let entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        let path = format!("/{}", entry_name(&entry)?);
        if entry_type.is_symlink()
            && let Some(target) = entry.link_name()?
        {
            links.insert(path.clone(), target.to_string_lossy().to_string());
        }
        files.push(path);
    }
    files.sort();

    let full_version =
        field("Version").ok_or_else(|| Error::malformed("deb", "control has no Version"))?;
    let (version, release) = split_deb_version(&full_version);

    Ok(InspectedPackage {
        format: OutputFormat::Deb,
        name: field("Package").ok_or_else(|| Error::malformed("deb", "control has no Package"))?,
        version,
        release,
        architecture: field("Architecture").unwrap_or_default(),
        maintainer: field("Maintainer"),
        vendor: field("Vendor"),
        url: field("Homepage"),
        description: field("Description").unwrap_or_default(),
        files,
        links,
        scripts,
    })
}

/// Archive member path without a leading "./"
fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let path = entry.path()?;
    let name = path.to_string_lossy();
    Ok(name.trim_start_matches("./").trim_end_matches('/').to_string())
}

/// Parse a Debian control file into fields
///
/// Multi-line values (the description) are folded back: continuation lines
/// lose their leading space and " ." becomes an empty line.
pub fn parse_control(content: &str) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some(key) = &current
                && let Some(value) = fields.get_mut(key)
            {
                value.push('\n');
                if rest != "." {
                    value.push_str(rest);
                }
            }
        } else if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            fields.insert(key.clone(), value.trim().to_string());
            current = Some(key);
        }
    }

    fields
}

/// Split `[epoch:]version[-revision]` into upstream version and revision
fn split_deb_version(full: &str) -> (String, Option<String>) {
    let without_epoch = full.split_once(':').map_or(full, |(_, v)| v);
    match without_epoch.rsplit_once('-') {
        Some((version, revision)) => (version.to_string(), Some(revision.to_string())),
        None => (without_epoch.to_string(), None),
    }
}
