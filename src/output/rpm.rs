// src/output/rpm.rs
//! RPM package writer
//!
//! Generates RPM packages using the `rpm` crate's PackageBuilder for
//! programmatic RPM creation.

use super::{
    GenerationResult, HookConverter, OutputFormat, OutputPackage, arch_for_format,
    build_timestamp, ensure_absent, indent,
};
use crate::error::Result;
use crate::package::{FileType, Package, PackageKind, Scripts};
use rpm::PackageBuilder;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Release used when the package has no iteration
pub const DEFAULT_RELEASE: &str = "1";

/// RPM-specific hook converter
struct RpmHookConverter;

impl HookConverter for RpmHookConverter {
    fn pre_install(&self, scripts: &Scripts) -> Option<String> {
        scripts.before_install.clone()
    }

    fn post_install(&self, scripts: &Scripts) -> Option<String> {
        scripts.after_install.clone()
    }

    fn pre_remove(&self, scripts: &Scripts) -> Option<String> {
        // $1 is the number of versions left after the transaction; 0 means erase
        let script = scripts.before_remove.as_ref()?;
        Some(format!("if [ \"$1\" -eq 0 ]; then\n{}\nfi", indent(script)))
    }

    fn post_remove(&self, scripts: &Scripts) -> Option<String> {
        scripts.after_remove.clone()
    }
}

/// A package ready to be written as an .rpm
#[derive(Debug)]
pub struct RpmPackage {
    package: Package,
}

impl RpmPackage {
    /// Architecture in RPM spelling
    pub fn architecture(&self) -> String {
        arch_for_format(&self.package.metadata.architecture, OutputFormat::Rpm)
    }

    /// Version with dashes replaced, since RPM reserves '-' as a separator
    pub fn version(&self) -> String {
        self.package.metadata.version.replace('-', "_")
    }

    /// Release: the package iteration or [`DEFAULT_RELEASE`]
    pub fn release(&self) -> String {
        self.package
            .metadata
            .iteration
            .clone()
            .unwrap_or_else(|| DEFAULT_RELEASE.to_string())
    }

    fn build(&self) -> Result<rpm::Package> {
        let meta = &self.package.metadata;
        let version = self.version();
        if version != meta.version {
            warn!(
                "RPM versions cannot contain dashes, using {} instead of {}",
                version, meta.version
            );
        }

        let arch = self.architecture();
        let mut builder =
            PackageBuilder::new(&meta.name, &version, &meta.license, &arch, meta.summary())
                .description(&meta.description)
                .release(self.release())
                .packager(&meta.maintainer)
                .group(&meta.category)
                .using_config(
                    rpm::BuildConfig::default()
                        .source_date(build_timestamp().min(u32::MAX as u64) as u32)
                        // Use Gzip for compatibility with older rpm versions
                        .compression(rpm::CompressionType::Gzip),
                );

        if let Some(epoch) = meta.epoch {
            builder = builder.epoch(epoch);
        }
        if let Some(vendor) = &meta.vendor {
            builder = builder.vendor(vendor);
        }
        if let Some(url) = &meta.url {
            builder = builder.url(url);
        }

        for file in self.package.files()? {
            match file.file_type {
                // Directories are owned by the filesystem package
                FileType::Directory => {}
                FileType::Regular => {
                    let options = rpm::FileOptions::new(&file.path)
                        .mode(rpm::FileMode::regular(file.mode as u16));
                    builder = builder.with_file(&file.source, options)?;
                    debug!("Added {} to RPM payload", file.path);
                }
                FileType::Symlink => {
                    if let Some(target) = &file.target {
                        builder =
                            builder.with_symlink(rpm::FileOptions::symlink(&file.path, target))?;
                    }
                }
            }
        }

        let converter = RpmHookConverter;
        let scripts = &self.package.scripts;

        if let Some(script) = converter.pre_install(scripts) {
            builder = builder.pre_install_script(script);
        }
        if let Some(script) = converter.post_install(scripts) {
            builder = builder.post_install_script(script);
        }
        if let Some(script) = converter.pre_remove(scripts) {
            builder = builder.pre_uninstall_script(script);
        }
        if let Some(script) = converter.post_remove(scripts) {
            builder = builder.post_uninstall_script(script);
        }

        // Build the package (unsigned)
        Ok(builder.build()?)
    }

    fn write_to(&self, output_path: &Path) -> Result<GenerationResult> {
        let package = self.build()?;
        let file_count = self
            .package
            .files()?
            .iter()
            .filter(|f| f.file_type == FileType::Regular)
            .count();

        let mut output_file = fs::File::create(output_path)?;
        package.write(&mut output_file)?;

        let size = fs::metadata(output_path)?.len();
        Ok(GenerationResult { size, file_count })
    }
}

impl PackageKind for RpmPackage {
    const KIND: &'static str = "rpm";

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

impl OutputPackage for RpmPackage {
    fn format(&self) -> OutputFormat {
        OutputFormat::Rpm
    }

    fn to_filename(&self) -> String {
        format!(
            "{}-{}-{}.{}.rpm",
            self.package.metadata.name,
            self.version(),
            self.release(),
            self.architecture()
        )
    }

    fn output(&self, path: &Path) -> Result<GenerationResult> {
        ensure_absent(path)?;
        debug!("Writing RPM package to {}", path.display());

        let result = self.write_to(path);
        if result.is_err() && path.exists() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_package() -> RpmPackage {
        let mut package = Package::new("tsuru-client").unwrap();
        package.metadata.version = "1.2.3".to_string();
        package.metadata.architecture = "amd64".to_string();
        package.metadata.maintainer = "tsuru@corp.globo.com".to_string();
        package.metadata.vendor = Some("Tsuru team <tsuru@corp.globo.com>".to_string());
        package.metadata.url = Some("https://tsuru.io".to_string());
        package.metadata.description = "Short line\n\nLong text".to_string();
        package.add_file("/usr/bin/tsuru", b"binary", 0o755).unwrap();
        package.convert().unwrap()
    }

    #[test]
    fn test_filename() {
        let mut pkg = test_package();
        assert_eq!(pkg.to_filename(), "tsuru-client-1.2.3-1.x86_64.rpm");

        pkg.package_mut().metadata.version = "2.0-rc1".to_string();
        pkg.package_mut().metadata.iteration = Some("3".to_string());
        assert_eq!(pkg.to_filename(), "tsuru-client-2.0_rc1-3.x86_64.rpm");
    }

    #[test]
    fn test_rpm_generation() {
        let mut pkg = test_package();
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join(pkg.to_filename());

        let result = pkg.output(&output_path).unwrap();
        assert!(output_path.exists());
        assert!(result.size > 0);
        assert_eq!(result.file_count, 1);

        let parsed = rpm::Package::open(&output_path).unwrap();
        assert_eq!(parsed.metadata.get_name().unwrap(), "tsuru-client");
        assert_eq!(parsed.metadata.get_version().unwrap(), "1.2.3");
        assert_eq!(parsed.metadata.get_release().unwrap(), "1");
        assert_eq!(parsed.metadata.get_vendor().unwrap(), "Tsuru team <tsuru@corp.globo.com>");
        assert_eq!(parsed.metadata.get_url().unwrap(), "https://tsuru.io");
        assert_eq!(parsed.metadata.get_packager().unwrap(), "tsuru@corp.globo.com");

        pkg.cleanup().unwrap();
        assert!(pkg.package().is_cleaned_up());
    }

    #[test]
    fn test_rpm_keeps_symlinks() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("bin")).unwrap();
        fs::write(src.path().join("bin/tsuru"), b"binary").unwrap();
        std::os::unix::fs::symlink("tsuru", src.path().join("bin/tsr")).unwrap();

        let mut package = Package::new("tsuru-client").unwrap();
        package.metadata.architecture = "x86_64".to_string();
        package
            .input(&format!("{}=/usr", src.path().display()))
            .unwrap();
        let pkg: RpmPackage = package.convert().unwrap();

        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join(pkg.to_filename());
        pkg.output(&output_path).unwrap();

        let parsed = rpm::Package::open(&output_path).unwrap();
        let entries = parsed.metadata.get_file_entries().unwrap();
        let link = entries
            .iter()
            .find(|e| e.path.to_string_lossy() == "/usr/bin/tsr")
            .unwrap();
        assert_eq!(link.linkto, "tsuru");
        let binary = entries
            .iter()
            .find(|e| e.path.to_string_lossy() == "/usr/bin/tsuru")
            .unwrap();
        assert!(binary.linkto.is_empty());
    }

    #[test]
    fn test_hook_converter_pre_remove() {
        let scripts = Scripts {
            before_remove: Some("sh /usr/share/pleaserun/x/cleanup.sh".to_string()),
            ..Scripts::default()
        };

        let converter = RpmHookConverter;
        let script = converter.pre_remove(&scripts).unwrap();
        assert_eq!(
            script,
            "if [ \"$1\" -eq 0 ]; then\n  sh /usr/share/pleaserun/x/cleanup.sh\nfi"
        );
        assert!(converter.post_install(&scripts).is_none());
    }
}
