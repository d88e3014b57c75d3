use std::fmt;

use serde::Serialize;

use crate::permissions::{JobPermission, JobPermissions};
use crate::scope::Scope;
use crate::source_map::Pos;
use crate::workflow::{Job, Permissions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Excessive,
    Insufficient,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FindingKind::Excessive => "excessive",
            FindingKind::Insufficient => "insufficient",
        })
    }
}

/// One category whose grant and requirement disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub category: String,
    pub scope: Scope,
    pub provenance: String,
    pub pos: Pos,
}

impl Finding {
    fn new(kind: FindingKind, category: &str, p: &JobPermission) -> Self {
        Self {
            kind,
            category: category.to_string(),
            scope: p.scope,
            provenance: p.provenance.clone(),
            pos: p.pos,
        }
    }

    pub fn message(&self, job_id: &str) -> String {
        let mut out = format!(
            "job {job_id} has {} permission: {}:{}",
            self.kind, self.category, self.scope
        );
        if !self.provenance.is_empty() {
            out.push_str(&format!(" (required by {})", self.provenance));
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub excessive: JobPermissions,
    pub insufficient: JobPermissions,
}

impl Comparison {
    /// Excessive findings first, then insufficient; each ordered by category.
    pub fn findings(&self) -> Vec<Finding> {
        let excessive = self
            .excessive
            .iter()
            .map(|(k, p)| Finding::new(FindingKind::Excessive, k, p));
        let insufficient = self
            .insufficient
            .iter()
            .map(|(k, p)| Finding::new(FindingKind::Insufficient, k, p));
        excessive.chain(insufficient).collect()
    }
}

pub fn compare(declared: &JobPermissions, derived: &JobPermissions) -> Comparison {
    Comparison {
        excessive: excessive_permissions(declared, derived),
        insufficient: insufficient_permissions(declared, derived),
    }
}

/// Grants in `declared` that no requirement in `derived` justifies.
///
/// When both sides have the key, the declared scope and position are reported
/// together with the provenance of the smaller requirement.
pub fn excessive_permissions(declared: &JobPermissions, derived: &JobPermissions) -> JobPermissions {
    let mut r = JobPermissions::new();
    for (k, granted) in declared.iter() {
        match derived.get(k) {
            None => r.add(k, &granted.provenance, granted.scope, granted.pos),
            Some(required) if required.scope < granted.scope => {
                r.add(k, &required.provenance, granted.scope, granted.pos)
            }
            Some(_) => {}
        }
    }
    r
}

/// Requirements in `derived` that `declared` does not meet.
pub fn insufficient_permissions(declared: &JobPermissions, derived: &JobPermissions) -> JobPermissions {
    let mut r = JobPermissions::new();
    for (k, required) in derived.iter() {
        match declared.get(k) {
            Some(granted) if granted.scope >= required.scope => {}
            _ => r.add(k, &required.provenance, required.scope, required.pos),
        }
    }
    r
}

/// What the job is granted: its own block, else the workflow's, else the baseline.
///
/// An explicit empty block (`permissions: {}`) grants nothing and is not defaulted.
pub fn declared_permissions(job: &Job, inherited: Option<&Permissions>) -> JobPermissions {
    let Some(block) = job.permissions.as_ref().or(inherited) else {
        return JobPermissions::baseline(job.pos);
    };
    let mut declared = JobPermissions::new();
    for s in block.scopes() {
        declared.add(&s.name, "", s.scope, s.pos);
    }
    declared
}
