// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("tsuru-packager")
        .version(env!("CARGO_PKG_VERSION"))
        .author("tsuru team")
        .about("Build RPM and DEB packages of the tsuru client")
        .arg(
            Arg::new("package_dir")
                .long("package-dir")
                .value_name("DIR")
                .env("PACKAGE_DIR")
                .help("Directory containing the built tsuru binary"),
        )
        .arg(
            Arg::new("package_version")
                .long("package-version")
                .value_name("VERSION")
                .env("PACKAGE_VERSION")
                .help("Version of the package being built"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .default_value(".")
                .help("Directory the packages are written to"),
        )
        .arg(
            Arg::new("recipe")
                .short('r')
                .long("recipe")
                .value_name("FILE")
                .help("TOML recipe overriding package metadata"),
        )
        .arg(
            Arg::new("arch")
                .short('a')
                .long("arch")
                .help("Target architecture (default: build host)"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("tsuru-packager.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
