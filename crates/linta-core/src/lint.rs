use std::path::Path;

use tracing::debug;

use crate::compare::{self, FindingKind};
use crate::config::{Config, IgnoreRules};
use crate::derive::{collect_used_actions, derive_job_permissions};
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::permissions::JobPermissions;
use crate::walker::{CallRequirements, JobContext, WorkflowProcessor, WorkflowWalker};
use crate::workflow::Job;

/// Diffs each job's declared permissions against what its actions need.
#[derive(Debug)]
pub struct Checker<'c> {
    config: &'c Config,
    ignores: IgnoreRules,
    diagnostics: Vec<Diagnostic>,
}

impl<'c> Checker<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            ignores: config.ignore_rules(),
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl WorkflowProcessor for Checker<'_> {
    fn on_job(&mut self, ctx: &JobContext<'_>, job: &Job) -> Result<JobPermissions> {
        let actions = collect_used_actions(job);
        let mut derived = derive_job_permissions(self.config, &actions);

        if let (CallRequirements::Resolved(callee), Some(call)) =
            (ctx.callee, job.workflow_call.as_ref())
        {
            for (category, p) in callee.iter() {
                derived.add(category, &call.uses, p.scope, call.pos);
            }
        }
        debug!(job = %job.id, ?derived, "derived permissions");

        let declared = compare::declared_permissions(job, ctx.inherited);
        let comparison = compare::compare(&declared, &derived);

        let path = ctx.path.display().to_string();
        for finding in comparison.findings() {
            if finding.kind == FindingKind::Excessive
                && matches!(ctx.callee, CallRequirements::Unresolved)
            {
                continue;
            }
            if self.ignores.is_ignored(&path, &job.id, &finding.category) {
                debug!(job = %job.id, category = %finding.category, "finding ignored by config");
                continue;
            }
            self.diagnostics
                .push(Diagnostic::new(finding.message(&job.id), path.clone(), finding.pos));
        }

        Ok(derived)
    }
}

/// Lints one top-level workflow (and the local workflows it calls).
///
/// Each linter owns its walker, so separate top-level files never share state.
pub struct Linter<'c> {
    walker: WorkflowWalker,
    checker: Checker<'c>,
}

impl<'c> Linter<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self::with_root(config, ".")
    }

    pub fn with_root(config: &'c Config, root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            walker: WorkflowWalker::with_root(root),
            checker: Checker::new(config),
        }
    }

    pub fn lint(&mut self, path: &Path) -> Result<()> {
        self.walker.walk(path, &mut self.checker)
    }

    pub fn errors(&self) -> &[Diagnostic] {
        self.checker.diagnostics()
    }

    pub fn into_errors(self) -> Vec<Diagnostic> {
        self.checker.into_diagnostics()
    }
}
