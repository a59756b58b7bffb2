// src/output/deb.rs
//! DEB package writer
//!
//! DEB packages are ar archives containing:
//! - debian-binary: version string "2.0\n"
//! - control.tar.gz: package metadata and scripts
//! - data.tar.gz: actual file contents

use super::{
    GenerationResult, HookConverter, OutputFormat, OutputPackage, arch_for_format,
    build_timestamp, ensure_absent, indent,
};
use crate::error::Result;
use crate::package::{FileEntry, FileType, Package, PackageKind, Scripts};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use tar::{Builder as TarBuilder, EntryType, Header};
use tracing::{debug, info, warn};

/// DEB-specific hook converter
struct DebHookConverter;

impl DebHookConverter {
    fn wrap(body: Vec<String>) -> String {
        let mut lines = vec!["#!/bin/sh".to_string(), "set -e".to_string()];
        lines.extend(body);
        lines.push("exit 0".to_string());
        lines.join("\n") + "\n"
    }
}

impl HookConverter for DebHookConverter {
    fn pre_install(&self, scripts: &Scripts) -> Option<String> {
        let script = scripts.before_install.as_ref()?;
        Some(Self::wrap(vec![script.clone()]))
    }

    fn post_install(&self, scripts: &Scripts) -> Option<String> {
        // dpkg also runs postinst on abort-* paths; only act on configure
        let script = scripts.after_install.as_ref()?;
        Some(Self::wrap(vec![
            "if [ \"$1\" = \"configure\" ]; then".to_string(),
            indent(script),
            "fi".to_string(),
        ]))
    }

    fn pre_remove(&self, scripts: &Scripts) -> Option<String> {
        // Upgrades run prerm with "upgrade"; keep the service in place then
        let script = scripts.before_remove.as_ref()?;
        Some(Self::wrap(vec![
            "if [ \"$1\" = \"remove\" ] || [ \"$1\" = \"deconfigure\" ]; then".to_string(),
            indent(script),
            "fi".to_string(),
        ]))
    }

    fn post_remove(&self, scripts: &Scripts) -> Option<String> {
        let script = scripts.after_remove.as_ref()?;
        Some(Self::wrap(vec![script.clone()]))
    }
}

/// A package ready to be written as a .deb
#[derive(Debug)]
pub struct DebPackage {
    package: Package,
}

impl DebPackage {
    /// Architecture in Debian spelling
    pub fn architecture(&self) -> String {
        arch_for_format(&self.package.metadata.architecture, OutputFormat::Deb)
    }

    /// Version without epoch: `version[-iteration]`
    pub fn version_with_iteration(&self) -> String {
        let meta = &self.package.metadata;
        match &meta.iteration {
            Some(iteration) => format!("{}-{}", meta.version, iteration),
            None => meta.version.clone(),
        }
    }

    /// Full version as it appears in the control file: `[epoch:]version[-iteration]`
    pub fn full_version(&self) -> String {
        match self.package.metadata.epoch {
            Some(epoch) => format!("{}:{}", epoch, self.version_with_iteration()),
            None => self.version_with_iteration(),
        }
    }

    /// Render the control file
    pub fn control(&self, installed_size: u64) -> String {
        let meta = &self.package.metadata;

        let mut control = format!(
            "Package: {}\n\
             Version: {}\n\
             License: {}\n",
            meta.name,
            self.full_version(),
            meta.license,
        );
        if let Some(vendor) = &meta.vendor {
            control.push_str(&format!("Vendor: {}\n", vendor));
        }
        control.push_str(&format!(
            "Architecture: {}\n\
             Maintainer: {}\n\
             Installed-Size: {}\n\
             Section: {}\n\
             Priority: extra\n",
            self.architecture(),
            meta.maintainer,
            installed_size.div_ceil(1024),
            meta.category,
        ));
        if let Some(homepage) = &meta.url {
            control.push_str(&format!("Homepage: {}\n", homepage));
        }
        control.push_str(&format!(
            "Description: {}\n",
            format_description(&meta.description, &meta.name)
        ));

        control
    }

    fn write_to(&self, output_path: &Path) -> Result<GenerationResult> {
        let mtime = build_timestamp();
        let files = self.package.files()?;

        let temp_dir = tempfile::Builder::new()
            .prefix("tsuru-packager-deb-")
            .tempdir()?;

        // data.tar.gz, collecting md5sums on the way
        let data_tar_path = temp_dir.path().join("data.tar.gz");
        let mut data = TarWriter::new(File::create(&data_tar_path)?, mtime);

        let mut md5sums = Vec::new();
        let mut file_count = 0;
        for file in &files {
            let name = file.path.trim_start_matches('/');
            match file.file_type {
                FileType::Directory => data.append_dir(name, file.mode)?,
                FileType::Symlink => {
                    if let Some(target) = &file.target {
                        data.append_symlink(name, target)?;
                    }
                }
                FileType::Regular => {
                    let content = fs::read(&file.source)?;
                    md5sums.push(format!(
                        "{}  {}",
                        compute_md5(&content),
                        name
                    ));
                    data.append_data(name, file.mode, &content)?;
                    file_count += 1;
                }
            }
        }
        data.finish()?;

        // control.tar.gz
        let control_tar_path = temp_dir.path().join("control.tar.gz");
        let mut control = TarWriter::new(File::create(&control_tar_path)?, mtime);
        let installed_size = self.package.installed_size()?;
        control.append_data("control", 0o644, self.control(installed_size).as_bytes())?;
        if !md5sums.is_empty() {
            control.append_data("md5sums", 0o644, (md5sums.join("\n") + "\n").as_bytes())?;
        }
        for (name, script) in self.maintainer_scripts() {
            control.append_data(name, 0o755, script.as_bytes())?;
        }
        control.finish()?;

        create_deb_archive(output_path, &control_tar_path, &data_tar_path, mtime)?;

        warn_on_unusual_files(&files);

        let size = fs::metadata(output_path)?.len();
        Ok(GenerationResult { size, file_count })
    }

    /// Maintainer scripts present in this package, by control member name
    fn maintainer_scripts(&self) -> Vec<(&'static str, String)> {
        let converter = DebHookConverter;
        let scripts = &self.package.scripts;

        [
            ("preinst", converter.pre_install(scripts)),
            ("postinst", converter.post_install(scripts)),
            ("prerm", converter.pre_remove(scripts)),
            ("postrm", converter.post_remove(scripts)),
        ]
        .into_iter()
        .filter_map(|(name, script)| script.map(|s| (name, s)))
        .collect()
    }
}

impl PackageKind for DebPackage {
    const KIND: &'static str = "deb";

    fn from_package(package: Package) -> Result<Self> {
        Ok(Self { package })
    }

    fn package(&self) -> &Package {
        &self.package
    }

    fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }
}

impl OutputPackage for DebPackage {
    fn format(&self) -> OutputFormat {
        OutputFormat::Deb
    }

    fn to_filename(&self) -> String {
        format!(
            "{}_{}_{}.deb",
            self.package.metadata.name,
            self.version_with_iteration(),
            self.architecture()
        )
    }

    fn output(&self, path: &Path) -> Result<GenerationResult> {
        ensure_absent(path)?;
        debug!("Writing DEB package to {}", path.display());

        let result = self.write_to(path);
        if result.is_err() && path.exists() {
            // Never leave a truncated archive behind
            let _ = fs::remove_file(path);
        }

        let result = result?;
        info!(
            "Wrote {} ({} bytes, {} files)",
            path.display(),
            result.size,
            result.file_count
        );
        Ok(result)
    }

    fn cleanup(&mut self) -> Result<()> {
        self.package.cleanup()
    }
}

/// Format a description for the control file
///
/// The first line is the synopsis. Continuation lines are indented by one
/// space and empty lines become " .".
pub fn format_description(description: &str, fallback: &str) -> String {
    let mut lines = description.trim().lines();
    let synopsis = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(fallback);

    let mut out = synopsis.to_string();
    for line in lines {
        out.push('\n');
        if line.trim().is_empty() {
            out.push_str(" .");
        } else {
            out.push(' ');
            out.push_str(line.trim_end());
        }
    }
    out
}

/// Gzipped tar stream with root-owned entries and a fixed mtime
struct TarWriter<W: Write> {
    builder: TarBuilder<GzEncoder<W>>,
    mtime: u64,
}

impl<W: Write> TarWriter<W> {
    fn new(writer: W, mtime: u64) -> Self {
        let builder = TarBuilder::new(GzEncoder::new(writer, Compression::default()));
        Self { builder, mtime }
    }

    fn header(&self, entry_type: EntryType, mode: u32, size: u64) -> io::Result<Header> {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(size);
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("root")?;
        header.set_groupname("root")?;
        header.set_mtime(self.mtime);
        Ok(header)
    }

    fn append_dir(&mut self, path: &str, mode: u32) -> io::Result<()> {
        let mut header = self.header(EntryType::Directory, mode, 0)?;
        self.builder.append_data(&mut header, path, io::empty())
    }

    fn append_data(&mut self, path: &str, mode: u32, content: &[u8]) -> io::Result<()> {
        let mut header = self.header(EntryType::Regular, mode, content.len() as u64)?;
        self.builder.append_data(&mut header, path, content)
    }

    fn append_symlink(&mut self, path: &str, target: &str) -> io::Result<()> {
        let mut header = self.header(EntryType::Symlink, 0o777, 0)?;
        self.builder.append_link(&mut header, path, target)
    }

    fn finish(self) -> io::Result<W> {
        let encoder = self.builder.into_inner()?;
        encoder.finish()
    }
}

/// Create the final .deb ar archive
fn create_deb_archive(
    output_path: &Path,
    control_tar: &Path,
    data_tar: &Path,
    mtime: u64,
) -> Result<()> {
    let file = File::create(output_path)?;
    let mut archive = ar::Builder::new(file);

    // debian-binary must be first
    let debian_binary = b"2.0\n";
    archive.append(
        &ar_header("debian-binary", debian_binary.len() as u64, mtime),
        &debian_binary[..],
    )?;

    for (name, path) in [("control.tar.gz", control_tar), ("data.tar.gz", data_tar)] {
        let member = File::open(path)?;
        let size = member.metadata()?.len();
        archive.append(&ar_header(name, size, mtime), member)?;
    }

    Ok(())
}

fn ar_header(name: &str, size: u64, mtime: u64) -> ar::Header {
    let mut header = ar::Header::new(name.as_bytes().to_vec(), size);
    header.set_mode(0o100644);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Log files dpkg handles poorly
fn warn_on_unusual_files(files: &[FileEntry]) {
    for file in files {
        if file.file_type == FileType::Regular && file.mode & 0o6000 != 0 {
            warn!("{} is setuid/setgid, check it is intended", file.path);
        }
    }
}

/// Compute MD5 hash of content (for md5sums file)
fn compute_md5(content: &[u8]) -> String {
    use md5::{Digest, Md5};
    let hash = Md5::digest(content);
    format!("{:x}", hash)
}

/// Read the named member of a .deb archive into memory
pub(crate) fn read_member(path: &Path, member: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = ar::Archive::new(File::open(path)?);
    while let Some(entry) = archive.next_entry() {
        let mut entry = entry?;
        if entry.header().identifier() == member.as_bytes() {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(Some(content));
        }
    }
    Ok(None)
}
