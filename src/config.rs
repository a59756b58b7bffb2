// src/config.rs
//! Recipe configuration and build inputs
//!
//! A recipe describes the package metadata. Every field has a default, so the
//! tsuru client recipe needs no file at all, and a TOML file only has to name
//! what it overrides.

use crate::error::{Error, Result};
use crate::package::NATIVE_ARCH;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the directory holding the built binary
pub const PACKAGE_DIR_VAR: &str = "PACKAGE_DIR";

/// Environment variable holding the version being packaged
pub const PACKAGE_VERSION_VAR: &str = "PACKAGE_VERSION";

const DEFAULT_NAME: &str = "tsuru-client";
const DEFAULT_MAINTAINER: &str = "tsuru@corp.globo.com";
const DEFAULT_VENDOR: &str = "Tsuru team <tsuru@corp.globo.com>";
const DEFAULT_URL: &str = "https://tsuru.io";
const DEFAULT_DESCRIPTION: &str = "tsuru is the command line interface for the tsuru server

Tsuru is an open source platform as a service software. This package installs
the client used by application developers to communicate with tsuru server.
";

/// Package metadata and layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecipeConfig {
    pub name: String,
    pub maintainer: String,
    pub vendor: String,
    pub url: String,
    pub description: String,
    pub license: Option<String>,
    /// File name of the binary inside the package directory
    pub binary: String,
    /// Install destination; a trailing '/' keeps the binary's file name
    pub install_dir: String,
    pub architecture: String,
    /// Package iteration (RPM release, Deb revision)
    pub iteration: Option<String>,
    pub service: Option<ServiceConfig>,
}

/// Overrides for the generated service definitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub args: Vec<String>,
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            maintainer: DEFAULT_MAINTAINER.to_string(),
            vendor: DEFAULT_VENDOR.to_string(),
            url: DEFAULT_URL.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            license: None,
            binary: "tsuru".to_string(),
            install_dir: "/usr/bin/".to_string(),
            architecture: NATIVE_ARCH.to_string(),
            iteration: None,
            service: None,
        }
    }
}

impl RecipeConfig {
    /// Parse a recipe from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a recipe from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Set the target architecture
    pub fn with_architecture(mut self, arch: &str) -> Self {
        self.architecture = arch.to_string();
        self
    }

    /// Set the service overrides
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = Some(service);
        self
    }

    /// Input mapping for the binary found in `package_dir`
    pub fn input_spec(&self, package_dir: &Path) -> String {
        format!(
            "{}={}",
            package_dir.join(&self.binary).display(),
            self.install_dir
        )
    }
}

/// The two values a build needs from its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInputs {
    pub package_dir: PathBuf,
    pub package_version: String,
}

impl BuildInputs {
    pub fn new(package_dir: impl Into<PathBuf>, package_version: &str) -> Self {
        Self {
            package_dir: package_dir.into(),
            package_version: package_version.to_string(),
        }
    }

    /// Read inputs through `lookup`; blank values count as missing
    ///
    /// Values that are present are taken verbatim.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let dir = read(PACKAGE_DIR_VAR);
        let version = read(PACKAGE_VERSION_VAR);

        match (dir, version) {
            (Some(dir), Some(version)) => Ok(Self::new(dir, &version)),
            (dir, version) => {
                let mut missing = Vec::new();
                if dir.is_none() {
                    missing.push(PACKAGE_DIR_VAR);
                }
                if version.is_none() {
                    missing.push(PACKAGE_VERSION_VAR);
                }
                Err(Error::MissingEnvironment(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_recipe() {
        let config = RecipeConfig::default();
        assert_eq!(config.name, "tsuru-client");
        assert_eq!(config.maintainer, "tsuru@corp.globo.com");
        assert_eq!(config.vendor, "Tsuru team <tsuru@corp.globo.com>");
        assert_eq!(config.url, "https://tsuru.io");
        assert!(config.description.starts_with("tsuru is the command line interface"));
        assert_eq!(config.install_dir, "/usr/bin/");
        assert!(config.service.is_none());
    }

    #[test]
    fn test_empty_recipe_is_default() {
        assert_eq!(RecipeConfig::parse("").unwrap(), RecipeConfig::default());
    }

    #[test]
    fn test_recipe_overrides() {
        let config = RecipeConfig::parse(
            r#"
            name = "tsuru-admin"
            iteration = "2"

            [service]
            args = ["--listen", ":8080"]
            user = "tsuru"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "tsuru-admin");
        assert_eq!(config.iteration.as_deref(), Some("2"));
        assert_eq!(config.maintainer, "tsuru@corp.globo.com");
        let service = config.service.unwrap();
        assert_eq!(service.args, vec!["--listen", ":8080"]);
        assert_eq!(service.user.as_deref(), Some("tsuru"));
        assert!(service.group.is_none());
    }

    #[test]
    fn test_recipe_rejects_unknown_keys() {
        assert!(matches!(
            RecipeConfig::parse("nmae = \"typo\""),
            Err(Error::Recipe(_))
        ));
    }

    #[test]
    fn test_input_spec() {
        let config = RecipeConfig::default();
        assert_eq!(
            config.input_spec(Path::new("/build/dist")),
            "/build/dist/tsuru=/usr/bin/"
        );
    }

    #[test]
    fn test_inputs_present() {
        let inputs =
            BuildInputs::from_lookup(lookup(&[("PACKAGE_DIR", "/tmp/dist"), ("PACKAGE_VERSION", "1.2.3")]))
                .unwrap();
        assert_eq!(inputs.package_dir, PathBuf::from("/tmp/dist"));
        assert_eq!(inputs.package_version, "1.2.3");
    }

    #[test]
    fn test_inputs_missing() {
        match BuildInputs::from_lookup(lookup(&[])) {
            Err(Error::MissingEnvironment(missing)) => {
                assert_eq!(missing, vec!["PACKAGE_DIR", "PACKAGE_VERSION"])
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match BuildInputs::from_lookup(lookup(&[("PACKAGE_DIR", "/tmp/dist")])) {
            Err(Error::MissingEnvironment(missing)) => assert_eq!(missing, vec!["PACKAGE_VERSION"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_inputs_version_kept_verbatim() {
        let inputs = BuildInputs::from_lookup(lookup(&[
            ("PACKAGE_DIR", "/tmp/dist"),
            ("PACKAGE_VERSION", "1.2.3-rc1 "),
        ]))
        .unwrap();
        assert_eq!(inputs.package_version, "1.2.3-rc1 ");
    }

    #[test]
    fn test_inputs_empty_counts_as_missing() {
        let result =
            BuildInputs::from_lookup(lookup(&[("PACKAGE_DIR", ""), ("PACKAGE_VERSION", "1.0")]));
        assert!(matches!(result, Err(Error::MissingEnvironment(m)) if m == vec!["PACKAGE_DIR"]));
    }
}
