// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use tsuru_packager::config::{BuildInputs, PACKAGE_DIR_VAR, PACKAGE_VERSION_VAR, RecipeConfig};
use tsuru_packager::{Error, recipe};

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let inputs = match BuildInputs::from_lookup(|key| match key {
        PACKAGE_DIR_VAR => cli.package_dir.clone(),
        PACKAGE_VERSION_VAR => cli.package_version.clone(),
        _ => None,
    }) {
        Ok(inputs) => inputs,
        Err(Error::MissingEnvironment(_)) => {
            println!("{} and {} should be set", PACKAGE_DIR_VAR, PACKAGE_VERSION_VAR);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let mut config = match &cli.recipe {
        Some(path) => RecipeConfig::from_file(path)
            .with_context(|| format!("Failed to load recipe {}", path.display()))?,
        None => RecipeConfig::default(),
    };
    if let Some(arch) = &cli.arch {
        config = config.with_architecture(arch);
    }

    recipe::run(&config, &inputs, &cli.output_dir).with_context(|| {
        format!(
            "Failed to package {} {}",
            config.name, inputs.package_version
        )
    })?;

    Ok(())
}
