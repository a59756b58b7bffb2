// src/service/mod.rs

//! Service-wrapped packages
//!
//! Wrapping a package as a service stages service-manager definitions for
//! the wrapped program next to its files:
//!
//! ```text
//! /usr/share/pleaserun/<name>/
//!     install.sh                           detects the service manager, copies files
//!     cleanup.sh                           stops the service, removes copied files
//!     systemd/etc/systemd/system/<name>.service
//!     systemd/etc/default/<name>
//!     sysv/etc/init.d/<name>
//!     sysv/etc/default/<name>
//! ```
//!
//! Nothing is installed into `/etc` by the package itself. The installer
//! runs from the after-install script and picks the tree matching the
//! host, so one package works on systemd and SysV hosts alike.

pub mod systemd;
pub mod sysv;

use crate::error::{Error, Result};
use crate::package::{FileType, Package, PackageKind, Scripts};
use tracing::info;

/// Root of the staged service definitions
pub const SERVICE_ROOT: &str = "/usr/share/pleaserun";

/// Directories searched for the program to wrap, in priority order
const PROGRAM_DIRS: &[&str] = &["/usr/bin/", "/usr/sbin/", "/bin/", "/sbin/"];

/// Service managers a wrapped package carries definitions for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePlatform {
    Systemd,
    Sysv,
}

impl ServicePlatform {
    pub const ALL: [Self; 2] = [Self::Systemd, Self::Sysv];

    /// Directory name under the service root
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Systemd => "systemd",
            Self::Sysv => "sysv",
        }
    }
}

/// How the wrapped program is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub user: String,
    pub group: String,
    pub description: String,
}

impl ServiceOptions {
    /// Options running `program` as root under the given service name
    pub fn new(name: &str, program: &str) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            user: "root".to_string(),
            group: "root".to_string(),
            description: name.to_string(),
        }
    }

    /// Set the program arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the user and group the service runs as
    pub fn with_user(mut self, user: &str, group: &str) -> Self {
        self.user = user.to_string();
        self.group = group.to_string();
        self
    }

    /// Set the human readable description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Program followed by its arguments
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Defaults derived from a package: its name and first staged executable
    pub fn detect(package: &Package) -> Result<Self> {
        let files = package.files()?;
        let program = PROGRAM_DIRS
            .iter()
            .find_map(|dir| {
                files.iter().find(|f| {
                    f.file_type != FileType::Directory
                        && f.path
                            .strip_prefix(*dir)
                            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
                })
            })
            .ok_or_else(|| Error::NoServiceProgram(package.metadata.name.clone()))?;

        Ok(Self::new(&package.metadata.name, &program.path)
            .with_description(package.metadata.summary()))
    }

    /// Base directory of this service's staged definitions
    pub fn base_dir(&self) -> String {
        format!("{}/{}", SERVICE_ROOT, self.name)
    }
}

/// A package carrying service-manager definitions for its program
#[derive(Debug)]
pub struct ServicePackage {
    package: Package,
    options: ServiceOptions,
}

impl ServicePackage {
    /// Wrap a package with explicit service options
    pub fn wrap(mut package: Package, options: ServiceOptions) -> Result<Self> {
        let base = options.base_dir();
        let unit = systemd::render_unit(&options);
        let defaults = render_defaults(&options);

        for platform in ServicePlatform::ALL {
            let root = format!("{}/{}", base, platform.as_str());
            package.add_file(
                &format!("{}/etc/default/{}", root, options.name),
                defaults.as_bytes(),
                0o644,
            )?;

            match platform {
                ServicePlatform::Systemd => package.add_file(
                    &format!("{}{}", root, systemd::unit_path(&options.name)),
                    unit.as_bytes(),
                    0o644,
                )?,
                ServicePlatform::Sysv => package.add_file(
                    &format!("{}{}", root, sysv::init_script_path(&options.name)),
                    sysv::render_init_script(&options).as_bytes(),
                    0o755,
                )?,
            }
        }

        package.add_file(
            &format!("{}/install.sh", base),
            render_installer(&options).as_bytes(),
            0o755,
        )?;
        package.add_file(
            &format!("{}/cleanup.sh", base),
            render_cleanup(&options, &unit).as_bytes(),
            0o755,
        )?;

        append_service_hooks(&mut package, &base);

        info!(
            "Wrapped {} as service '{}' running {}",
            package.metadata.name,
            options.name,
            options.command_line()
        );
        Ok(Self { package, options })
    }

    /// Service options used for the wrap
    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }
}

impl PackageKind for ServicePackage {
    const KIND: &'static str = "service";

    fn from_package(package: Package) -> Result<Self> {
        let options = ServiceOptions::detect(&package)?;
        Self::wrap(package, options)
    }

    fn package(&self) -> &Package {
        &self.package
    }

    fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }
}

/// Wire the installer and cleanup scripts into the package lifecycle
fn append_service_hooks(package: &mut Package, base: &str) {
    Scripts::append(
        &mut package.scripts.after_install,
        &format!("sh {}/install.sh", base),
    );
    Scripts::append(
        &mut package.scripts.before_remove,
        &format!("sh {}/cleanup.sh", base),
    );
}

/// Contents of /etc/default/<name>, sourced by both service managers
fn render_defaults(options: &ServiceOptions) -> String {
    format!(
        "# Environment for the {} service. Set variables as KEY=value.\n",
        options.name
    )
}

/// Installer script: pick the host's service manager and copy its tree
fn render_installer(options: &ServiceOptions) -> String {
    let base = options.base_dir();
    format!(
        r#"#!/bin/sh
set -e

base="{base}"

if command -v systemctl >/dev/null 2>&1 && [ -d /run/systemd/system ]; then
  platform=systemd
elif [ -d /etc/init.d ]; then
  platform=sysv
else
  echo "Unable to detect a supported service manager for {name}" >&2
  exit 0
fi

echo "Installing {name} service for $platform"
(cd "$base/$platform" && find . -type f) | while read -r file; do
  target="/${{file#./}}"
  mkdir -p "$(dirname "$target")"
  if [ ! -e "$target" ] || [ "${{target#/etc/default/}}" = "$target" ]; then
    cp -p "$base/$platform/$file" "$target"
  fi
done

if [ "$platform" = systemd ]; then
  systemctl daemon-reload
fi
"#,
        base = base,
        name = options.name,
    )
}

/// Cleanup script: stop the service and remove anything the installer placed
fn render_cleanup(options: &ServiceOptions, unit: &str) -> String {
    let name = &options.name;
    let unit_name = format!("{}.service", name);

    let mut remove = vec![
        systemd::unit_path(name),
        sysv::init_script_path(name),
    ];
    remove.extend(systemd::enablement_links(unit, &unit_name));

    let rm_lines: Vec<String> = remove.iter().map(|p| format!("rm -f {}", p)).collect();

    format!(
        r#"#!/bin/sh

if command -v systemctl >/dev/null 2>&1 && [ -f {unit_path} ]; then
  systemctl stop {unit_name} 2>/dev/null || true
  systemctl disable {unit_name} 2>/dev/null || true
fi
if [ -x {init_path} ]; then
  {init_path} stop 2>/dev/null || true
fi

{rm_lines}

if command -v systemctl >/dev/null 2>&1 && [ -d /run/systemd/system ]; then
  systemctl daemon-reload || true
fi
exit 0
"#,
        unit_path = systemd::unit_path(name),
        unit_name = unit_name,
        init_path = sysv::init_script_path(name),
        rm_lines = rm_lines.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tsuru_package() -> Package {
        let mut package = Package::new("tsuru-client").unwrap();
        package.metadata.description =
            "tsuru is the command line interface for the tsuru server\n\nMore.".to_string();
        package.add_file("/usr/bin/tsuru", b"binary", 0o755).unwrap();
        package
    }

    #[test]
    fn test_detect_program() {
        let package = tsuru_package();
        let options = ServiceOptions::detect(&package).unwrap();

        assert_eq!(options.name, "tsuru-client");
        assert_eq!(options.program, "/usr/bin/tsuru");
        assert_eq!(
            options.description,
            "tsuru is the command line interface for the tsuru server"
        );
    }

    #[test]
    fn test_detect_prefers_usr_bin() {
        let mut package = Package::new("pair").unwrap();
        package.add_file("/usr/sbin/zzz", b"a", 0o755).unwrap();
        package.add_file("/usr/bin/aaa", b"b", 0o755).unwrap();
        package.add_file("/usr/bin/sub/nested", b"c", 0o755).unwrap();

        let options = ServiceOptions::detect(&package).unwrap();
        assert_eq!(options.program, "/usr/bin/aaa");
    }

    #[test]
    fn test_detect_without_program() {
        let mut package = Package::new("docs").unwrap();
        package.add_file("/usr/share/doc/README", b"hi", 0o644).unwrap();

        let err = ServiceOptions::detect(&package).unwrap_err();
        assert!(matches!(err, Error::NoServiceProgram(name) if name == "docs"));
    }

    #[test]
    fn test_convert_stages_service_files() {
        let package = tsuru_package();
        let service: ServicePackage = package.convert().unwrap();

        let files = service.package().files().unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        let base = "/usr/share/pleaserun/tsuru-client";
        for expected in [
            "/usr/bin/tsuru",
            "/usr/share/pleaserun/tsuru-client/install.sh",
            "/usr/share/pleaserun/tsuru-client/cleanup.sh",
            "/usr/share/pleaserun/tsuru-client/systemd/etc/systemd/system/tsuru-client.service",
            "/usr/share/pleaserun/tsuru-client/systemd/etc/default/tsuru-client",
            "/usr/share/pleaserun/tsuru-client/sysv/etc/init.d/tsuru-client",
            "/usr/share/pleaserun/tsuru-client/sysv/etc/default/tsuru-client",
        ] {
            assert!(paths.contains(&expected), "missing {}", expected);
        }

        let init = files
            .iter()
            .find(|f| f.path.ends_with("/etc/init.d/tsuru-client"))
            .unwrap();
        assert_eq!(init.mode, 0o755);

        let scripts = &service.package().scripts;
        assert_eq!(
            scripts.after_install.as_deref(),
            Some(format!("sh {}/install.sh", base).as_str())
        );
        assert_eq!(
            scripts.before_remove.as_deref(),
            Some(format!("sh {}/cleanup.sh", base).as_str())
        );

        // The source package is left untouched
        assert!(package.scripts.after_install.is_none());
        assert_eq!(package.files().unwrap().len(), 3);
    }

    #[test]
    fn test_cleanup_script_removes_enablement_links() {
        let options = ServiceOptions::new("tsuru", "/usr/bin/tsuru");
        let unit = systemd::render_unit(&options);
        let cleanup = render_cleanup(&options, &unit);

        assert!(cleanup.contains("rm -f /etc/systemd/system/tsuru.service\n"));
        assert!(cleanup.contains("rm -f /etc/init.d/tsuru\n"));
        assert!(cleanup.contains(
            "rm -f /etc/systemd/system/multi-user.target.wants/tsuru.service"
        ));
        assert!(cleanup.contains("systemctl stop tsuru.service"));
    }

    #[test]
    fn test_installer_script() {
        let options = ServiceOptions::new("tsuru", "/usr/bin/tsuru");
        let installer = render_installer(&options);

        assert!(installer.contains("base=\"/usr/share/pleaserun/tsuru\""));
        assert!(installer.contains("target=\"/${file#./}\""));
        assert!(installer.contains("systemctl daemon-reload"));
    }
}
