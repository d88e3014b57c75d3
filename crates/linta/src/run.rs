use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use linta_core::config::Config;
use linta_core::lint::Linter;
use tracing::debug;

use crate::discover;
use crate::reporting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Workflow files or directories (default: .github/workflows).
    #[arg(value_name = "WORKFLOW")]
    pub workflows: Vec<PathBuf>,

    /// Config file (default: .linta.yml if present, else the built-in mapping).
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

pub fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let root = Path::new(".");
    let (config, source) = Config::lookup_from(root, args.config_path.as_deref())
        .context("load config")?;
    debug!(%source, "config loaded:\n{config}");

    let workflows = discover::workflow_paths(root, &args.workflows)?;

    let mut diagnostics = Vec::new();
    for w in &workflows {
        let mut linter = Linter::with_root(&config, root);
        linter
            .lint(w)
            .with_context(|| format!("lint: {}", w.display()))?;
        diagnostics.extend(linter.into_errors());
    }

    match args.format {
        Format::Text => reporting::emit_text(&diagnostics)?,
        Format::Json => reporting::emit_json(&diagnostics)?,
    }

    if diagnostics.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}
