// src/cli.rs
//! CLI definitions for the tsuru packager
//!
//! Flags fall back to the environment variables the build pipeline exports.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tsuru-packager")]
#[command(author = "tsuru team")]
#[command(version)]
#[command(about = "Build RPM and DEB packages of the tsuru client", long_about = None)]
pub struct Cli {
    /// Directory containing the built tsuru binary
    #[arg(long, env = "PACKAGE_DIR")]
    pub package_dir: Option<String>,

    /// Version of the package being built
    #[arg(long, env = "PACKAGE_VERSION")]
    pub package_version: Option<String>,

    /// Directory the packages are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// TOML recipe overriding package metadata
    #[arg(short, long)]
    pub recipe: Option<PathBuf>,

    /// Target architecture (default: build host)
    #[arg(short, long)]
    pub arch: Option<String>,
}
