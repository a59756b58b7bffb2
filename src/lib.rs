// src/lib.rs

//! tsuru client packager
//!
//! Builds OS-native packages of the tsuru command line client together with
//! service-manager definitions for its binary.
//!
//! # Architecture
//!
//! - Conversion graph: a generic [`Package`] converts into a service-wrapped
//!   representation, which converts into RPM and DEB writers
//! - Owned staging: every representation stages its files in its own
//!   temporary directory and releases it on cleanup
//! - Scoped cleanup: the recipe releases every output package when it leaves
//!   scope, including on errors

pub mod config;
mod error;
pub mod inspect;
pub mod output;
pub mod package;
pub mod recipe;
pub mod service;

pub use config::{BuildInputs, RecipeConfig, ServiceConfig};
pub use error::{Error, Result};
pub use inspect::{InspectedPackage, inspect};
pub use output::{DebPackage, OutputFormat, OutputPackage, RpmPackage};
pub use package::{Metadata, Package, PackageKind, Scripts};
pub use service::{ServiceOptions, ServicePackage};
