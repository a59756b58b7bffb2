// src/recipe.rs
//! The tsuru client packaging recipe
//!
//! Builds a package from the client binary, wraps it with service
//! definitions, converts the result to RPM and DEB, and writes both.
//! Staging directories of every representation are released before
//! [`run`] returns, whether it succeeds or not.

use crate::config::{BuildInputs, RecipeConfig};
use crate::error::Result;
use crate::output::{DebPackage, OutputPackage, RpmPackage};
use crate::package::{Package, PackageKind};
use crate::service::{ServiceOptions, ServicePackage};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Output packages whose resources are released when the set is dropped
#[derive(Default)]
pub struct OutputSet {
    packages: Vec<Box<dyn OutputPackage>>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, package: Box<dyn OutputPackage>) {
        self.packages.push(package);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn OutputPackage> {
        self.packages.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        for package in &mut self.packages {
            if let Err(e) = package.cleanup() {
                warn!("Failed to clean up {} package: {}", package.format(), e);
            }
        }
    }
}

/// Build the descriptor for the configured binary
pub fn build_package(config: &RecipeConfig, inputs: &BuildInputs) -> Result<Package> {
    let mut package = Package::new(&config.name)?;

    let meta = &mut package.metadata;
    meta.version = inputs.package_version.clone();
    meta.iteration = config.iteration.clone();
    meta.maintainer = config.maintainer.clone();
    meta.vendor = Some(config.vendor.clone());
    meta.url = Some(config.url.clone());
    meta.description = config.description.clone();
    meta.architecture = config.architecture.clone();
    if let Some(license) = &config.license {
        meta.license = license.clone();
    }

    package.input(&config.input_spec(&inputs.package_dir))?;
    Ok(package)
}

/// Wrap the descriptor with service definitions
pub fn wrap_service(config: &RecipeConfig, package: &Package) -> Result<ServicePackage> {
    let Some(service) = &config.service else {
        return package.convert();
    };

    let mut options = ServiceOptions::detect(package)?.with_args(service.args.clone());
    if service.user.is_some() || service.group.is_some() {
        let user = service.user.as_deref().unwrap_or("root");
        let group = service.group.as_deref().unwrap_or(user);
        options = options.with_user(user, group);
    }
    ServicePackage::wrap(package.duplicate()?, options)
}

/// Produce the RPM and DEB packages in `output_dir`
///
/// Prints `successfully created <path>` for each file written and returns
/// their paths. If a later package fails, files already written are kept.
pub fn run(config: &RecipeConfig, inputs: &BuildInputs, output_dir: &Path) -> Result<Vec<PathBuf>> {
    info!(
        "Packaging {} {} from {}",
        config.name,
        inputs.package_version,
        inputs.package_dir.display()
    );

    let mut outputs = OutputSet::new();
    {
        let mut package = build_package(config, inputs)?;
        let mut service = wrap_service(config, &package)?;
        package.cleanup()?;

        outputs.push(Box::new(service.convert::<RpmPackage>()?));
        outputs.push(Box::new(service.convert::<DebPackage>()?));
        service.package_mut().cleanup()?;
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(outputs.len());
    for package in outputs.iter() {
        let path = output_dir.join(package.to_filename());
        if let Err(e) = package.output(&path) {
            for kept in &written {
                warn!("Keeping {} after failure", kept.display());
            }
            return Err(e);
        }
        println!("successfully created {}", path.display());
        written.push(path);
    }

    Ok(written)
}
