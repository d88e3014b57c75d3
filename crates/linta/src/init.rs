use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use linta_core::collect::build_config;
use linta_core::config::{Config, DEFAULT_CONFIG_PATH};
use tracing::debug;

use crate::discover;
use crate::reporting;

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Workflow files or directories (default: .github/workflows).
    #[arg(value_name = "WORKFLOW")]
    pub workflows: Vec<PathBuf>,

    /// Where to write the config.
    #[arg(short = 'o', long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub output_path: PathBuf,

    /// Replace an existing config file.
    #[arg(long)]
    pub overwrite: bool,
}

pub fn cmd_init(args: InitArgs) -> Result<ExitCode> {
    let root = Path::new(".");
    let workflows = discover::workflow_paths(root, &args.workflows)?;
    for p in &workflows {
        debug!(path = %p.display(), "workflow");
    }

    let mut config = build_config(root, &workflows).context("collect actions")?;
    let builtin = Config::builtin().context("load built-in config")?;
    config.merge(&builtin, true);

    if args.output_path.exists() && !args.overwrite {
        anyhow::bail!("already exists: {}", args.output_path.display());
    }
    let yaml = config.to_yaml().context("encode config")?;
    reporting::write_bytes(&args.output_path, yaml.as_bytes())?;
    eprintln!("Created {}", args.output_path.display());
    Ok(ExitCode::SUCCESS)
}
