//! Depth-first traversal of a workflow and the local reusable workflows it calls.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::permissions::JobPermissions;
use crate::workflow::{self, Job, Permissions};

/// Requirements of the workflow a job calls, as far as the walk could tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallRequirements {
    /// The job runs steps; it calls no workflow.
    NotACall,
    /// Aggregate requirements of every job in the callee (transitively).
    Resolved(JobPermissions),
    /// Remote, missing, or currently being walked (a cycle).
    Unresolved,
}

pub struct JobContext<'a> {
    pub path: &'a Path,
    /// Workflow-level `permissions:` of the file the job belongs to.
    pub inherited: Option<&'a Permissions>,
    pub callee: &'a CallRequirements,
}

/// Per-job strategy plugged into [`WorkflowWalker`].
pub trait WorkflowProcessor {
    /// Handles one job and returns the permissions it was found to require.
    fn on_job(&mut self, ctx: &JobContext<'_>, job: &Job) -> Result<JobPermissions>;
}

#[derive(Debug, Clone)]
enum CallState {
    Visiting,
    Done(JobPermissions),
}

/// Owns the visited set for one top-level walk. Do not share across walks.
#[derive(Debug)]
pub struct WorkflowWalker {
    root: PathBuf,
    records: HashMap<PathBuf, CallState>,
}

impl Default for WorkflowWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowWalker {
    pub fn new() -> Self {
        Self::with_root(".")
    }

    /// `root` is the repository root that `./...` call targets are relative to.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            records: HashMap::new(),
        }
    }

    pub fn is_recorded(&self, path: &Path) -> bool {
        self.records.contains_key(&record_key(path))
    }

    /// Walks `path` unless it was already walked by this walker.
    ///
    /// The top-level file must exist; call targets that do not are skipped.
    pub fn walk(&mut self, path: &Path, p: &mut dyn WorkflowProcessor) -> Result<()> {
        let key = record_key(path);
        if self.records.contains_key(&key) {
            debug!(path = %path.display(), "skip already walked workflow");
            return Ok(());
        }
        self.walk_file(path, key, p).map(|_| ())
    }

    fn walk_file(
        &mut self,
        path: &Path,
        key: PathBuf,
        p: &mut dyn WorkflowProcessor,
    ) -> Result<JobPermissions> {
        self.records.insert(key.clone(), CallState::Visiting);
        debug!(path = %path.display(), "walk workflow");

        let bytes = std::fs::read(path).map_err(|err| Error::io(path, err))?;
        let wf = workflow::parse(&bytes).map_err(|err| Error::Parse {
            path: path.to_path_buf(),
            line: err.pos.line,
            column: err.pos.col,
            message: err.message,
        })?;

        let mut aggregate = JobPermissions::new();
        for job in &wf.jobs {
            let callee = match &job.workflow_call {
                None => CallRequirements::NotACall,
                Some(call) => self.call_requirements(&call.uses, p)?,
            };
            let ctx = JobContext {
                path,
                inherited: wf.permissions.as_ref(),
                callee: &callee,
            };
            let required = p.on_job(&ctx, job)?;
            aggregate.merge(&required);
        }

        self.records.insert(key, CallState::Done(aggregate.clone()));
        Ok(aggregate)
    }

    fn call_requirements(
        &mut self,
        uses: &str,
        p: &mut dyn WorkflowProcessor,
    ) -> Result<CallRequirements> {
        let Some(target) = self.resolve_call(uses) else {
            debug!(uses, "workflow call not found locally; not descending");
            return Ok(CallRequirements::Unresolved);
        };
        let key = record_key(&target);
        match self.records.get(&key) {
            Some(CallState::Visiting) => {
                debug!(uses, "workflow call cycle; not descending");
                Ok(CallRequirements::Unresolved)
            }
            Some(CallState::Done(required)) => {
                debug!(uses, "workflow call already walked");
                Ok(CallRequirements::Resolved(required.clone()))
            }
            None => {
                let display = normalize(&target);
                let required = self.walk_file(&display, key, p)?;
                Ok(CallRequirements::Resolved(required))
            }
        }
    }

    fn resolve_call(&self, uses: &str) -> Option<PathBuf> {
        if uses.contains('@') {
            return None;
        }
        let candidate = self.root.join(uses);
        candidate.is_file().then_some(candidate)
    }
}

/// Identity of a workflow file in the visited set, independent of how the path is spelled.
fn record_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
}

/// Lexical normalization: drops `.` segments and folds `dir/..`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(
            normalize(Path::new("./.github/workflows/a.yml")),
            PathBuf::from(".github/workflows/a.yml")
        );
        assert_eq!(
            normalize(Path::new("ci/../.github/./workflows/a.yml")),
            PathBuf::from(".github/workflows/a.yml")
        );
        assert_eq!(normalize(Path::new("../x.yml")), PathBuf::from("../x.yml"));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }
}
