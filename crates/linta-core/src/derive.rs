use crate::config::PermissionLookup;
use crate::permissions::JobPermissions;
use crate::source_map::Pos;
use crate::workflow::{Job, StepExec};

/// An action invoked by a step (`steps[*].uses`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAction {
    pub value: String,
    pub pos: Pos,
}

impl StepAction {
    /// Identity used for lookups: everything before the first `@`.
    pub fn action_name(&self) -> &str {
        action_name(&self.value)
    }
}

pub fn action_name(uses: &str) -> &str {
    uses.split('@').next().unwrap_or(uses)
}

/// Action steps of `job`, in document order. `run:` steps contribute nothing.
pub fn collect_used_actions(job: &Job) -> Vec<StepAction> {
    job.steps
        .iter()
        .filter_map(|step| match &step.exec {
            StepExec::Action(action) => Some(StepAction {
                value: action.uses.clone(),
                pos: action.pos,
            }),
            StepExec::Run | StepExec::Other => None,
        })
        .collect()
}

pub fn derive_job_permissions(lookup: &dyn PermissionLookup, actions: &[StepAction]) -> JobPermissions {
    let mut derived = JobPermissions::new();
    for action in actions {
        let name = action.action_name();
        let Some(required) = lookup.lookup(name) else {
            continue;
        };
        for (category, scope) in required {
            derived.add(category, name, *scope, action.pos);
        }
    }
    derived
}
