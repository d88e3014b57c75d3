use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::{Config, PermissionConfig};
use crate::derive::{collect_used_actions, StepAction};
use crate::error::Result;
use crate::permissions::JobPermissions;
use crate::walker::{JobContext, WorkflowProcessor, WorkflowWalker};
use crate::workflow::Job;

/// Records every action the walked workflows invoke, to seed a config file.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    actions: Vec<StepAction>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted, de-duplicated `owner/repo[/path]` identities. Docker and local actions are skipped.
    pub fn repositories(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(StepAction::action_name)
            .filter(|name| {
                !name.starts_with("docker://") && !name.starts_with("./") && name.contains('/')
            })
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl WorkflowProcessor for ConfigBuilder {
    fn on_job(&mut self, _ctx: &JobContext<'_>, job: &Job) -> Result<JobPermissions> {
        self.actions.extend(collect_used_actions(job));
        Ok(JobPermissions::new())
    }
}

/// Walks `workflow_paths` with one walker and returns a config listing every
/// action found, each with an empty mapping.
pub fn build_config(root: &Path, workflow_paths: &[PathBuf]) -> Result<Config> {
    let mut builder = ConfigBuilder::new();
    let mut walker = WorkflowWalker::with_root(root);
    for p in workflow_paths {
        walker.walk(p, &mut builder)?;
    }

    let mut config = Config::new();
    for r in builder.repositories() {
        config.update(&r, PermissionConfig::new());
    }
    Ok(config)
}
