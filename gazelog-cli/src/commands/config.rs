//! `gazelog config` - inspect and scaffold configuration

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};

use crate::config::{ConfigLoader, GazelogConfig};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration file paths
    Path,
    /// Write a project config file with the default settings
    Init {
        /// Overwrite an existing project config
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
        ConfigCommands::Init { force } => init_project_config(&ConfigLoader::project_config_path(), force),
    }
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn show_paths() -> Result<()> {
    match ConfigLoader::user_config_path() {
        Some(path) => println!("User config:    {} {}", path.display(), presence(&path)),
        None => println!("User config:    <no home directory>"),
    }
    let project = ConfigLoader::project_config_path();
    println!("Project config: {} {}", project.display(), presence(&project));
    Ok(())
}

fn presence(path: &Path) -> &'static str {
    if path.exists() { "(found)" } else { "(not found)" }
}

fn init_project_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let contents = toml::to_string_pretty(&GazelogConfig::default())?;
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
