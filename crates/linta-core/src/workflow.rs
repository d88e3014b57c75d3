//! Typed view of a GitHub Actions workflow, restricted to what permission checks need.

use std::fmt;

use serde::Deserialize;
use serde_yaml::Value;

use crate::scope::{Scope, CATEGORIES};
use crate::source_map::{escape_token, Pos, SourceMap};

#[derive(Debug, Clone, Default)]
pub struct Workflow {
    /// Workflow-level `permissions:`, inherited by jobs that declare none.
    pub permissions: Option<Permissions>,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub pos: Pos,
    pub permissions: Option<Permissions>,
    pub steps: Vec<Step>,
    pub workflow_call: Option<WorkflowCall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permissions {
    /// `read-all` / `write-all`.
    All { scope: Scope, pos: Pos },
    /// Explicit mapping; may be empty (`permissions: {}`).
    Scopes(Vec<PermissionScope>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionScope {
    pub name: String,
    pub scope: Scope,
    pub pos: Pos,
}

impl Permissions {
    /// Flattens the block into `(category, scope, pos)` entries in declaration order.
    pub fn scopes(&self) -> Vec<PermissionScope> {
        match self {
            Permissions::All { scope, pos } => CATEGORIES
                .iter()
                .map(|name| PermissionScope {
                    name: name.to_string(),
                    scope: *scope,
                    pos: *pos,
                })
                .collect(),
            Permissions::Scopes(scopes) => scopes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub exec: StepExec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepExec {
    Action(ExecAction),
    Run,
    Other,
}

/// `steps[*].uses`: `owner/repo[/path]@ref`, `./local`, or `docker://image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecAction {
    pub uses: String,
    pub pos: Pos,
}

/// `jobs.<id>.uses`: a reusable workflow reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowCall {
    pub uses: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.pos.line, self.pos.col, self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    #[serde(default)]
    permissions: Option<Value>,
    #[serde(default)]
    jobs: Option<serde_yaml::Mapping>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    #[serde(default)]
    permissions: Option<Value>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
    #[serde(default)]
    uses: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    uses: Option<String>,
    #[serde(default)]
    run: Option<Value>,
}

pub fn parse(bytes: &[u8]) -> Result<Workflow, ParseError> {
    let src = std::str::from_utf8(bytes).map_err(|err| ParseError {
        message: format!("workflow is not valid UTF-8: {err}"),
        pos: Pos::default(),
    })?;
    let blank = src.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    });
    if blank {
        return Ok(Workflow::default());
    }

    let doc: Value = serde_yaml::from_str(src).map_err(|err| {
        let pos = err
            .location()
            .map(|loc| Pos::new(to_u32(loc.line()), to_u32(loc.column())))
            .unwrap_or_default();
        ParseError {
            message: err.to_string(),
            pos,
        }
    })?;
    if doc.is_null() {
        return Ok(Workflow::default());
    }
    let raw: RawWorkflow = serde_yaml::from_value(doc).map_err(|err| ParseError {
        message: format!("workflow: {err}"),
        pos: Pos::default(),
    })?;
    let map = SourceMap::build(src);

    let permissions = raw
        .permissions
        .as_ref()
        .map(|v| parse_permissions(v, "/permissions", &map))
        .transpose()?
        .flatten();

    let mut jobs = Vec::new();
    for (key, value) in raw.jobs.unwrap_or_default() {
        let Some(id) = key.as_str() else {
            return Err(ParseError {
                message: format!("job id must be a string, got {key:?}"),
                pos: map.key_pos("/jobs").unwrap_or_default(),
            });
        };
        jobs.push(parse_job(id, value, &map)?);
    }

    Ok(Workflow { permissions, jobs })
}

fn parse_job(id: &str, value: Value, map: &SourceMap) -> Result<Job, ParseError> {
    let base = format!("/jobs/{}", escape_token(id));
    let pos = map.key_pos(&base).unwrap_or_default();
    let raw: RawJob = serde_yaml::from_value(value).map_err(|err| ParseError {
        message: format!("job {id:?}: {err}"),
        pos,
    })?;

    let permissions = raw
        .permissions
        .as_ref()
        .map(|v| parse_permissions(v, &format!("{base}/permissions"), map))
        .transpose()?
        .flatten();

    let steps = raw
        .steps
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, step)| {
            let step_ptr = format!("{base}/steps/{i}");
            let exec = match (step.uses, step.run) {
                (Some(uses), _) => StepExec::Action(ExecAction {
                    pos: value_pos(map, &format!("{step_ptr}/uses")),
                    uses,
                }),
                (None, Some(_)) => StepExec::Run,
                (None, None) => StepExec::Other,
            };
            Step { exec }
        })
        .collect();

    let workflow_call = raw.uses.map(|uses| WorkflowCall {
        pos: value_pos(map, &format!("{base}/uses")),
        uses,
    });

    Ok(Job {
        id: id.to_string(),
        pos,
        permissions,
        steps,
        workflow_call,
    })
}

/// `None` for an explicit null (`permissions:` with no value), which GitHub treats as absent.
fn parse_permissions(
    value: &Value,
    ptr: &str,
    map: &SourceMap,
) -> Result<Option<Permissions>, ParseError> {
    let block_pos = value_pos(map, ptr);
    match value {
        Value::Null => Ok(None),
        Value::String(s) => match s.as_str() {
            "read-all" => Ok(Some(Permissions::All {
                scope: Scope::Read,
                pos: block_pos,
            })),
            "write-all" => Ok(Some(Permissions::All {
                scope: Scope::Write,
                pos: block_pos,
            })),
            other => Err(ParseError {
                message: format!("invalid permissions: {other:?} (expected read-all, write-all, or a mapping)"),
                pos: block_pos,
            }),
        },
        Value::Mapping(m) => {
            let mut scopes = Vec::with_capacity(m.len());
            for (k, v) in m {
                let (Some(name), Some(raw_scope)) = (k.as_str(), v.as_str()) else {
                    return Err(ParseError {
                        message: format!("invalid permission entry: {k:?}: {v:?}"),
                        pos: block_pos,
                    });
                };
                let entry_ptr = format!("{ptr}/{}", escape_token(name));
                let pos = map.value_pos(&entry_ptr).unwrap_or(block_pos);
                let scope = raw_scope.parse::<Scope>().map_err(|message| ParseError {
                    message: format!("permission {name:?}: {message}"),
                    pos,
                })?;
                scopes.push(PermissionScope {
                    name: name.to_string(),
                    scope,
                    pos,
                });
            }
            Ok(Some(Permissions::Scopes(scopes)))
        }
        other => Err(ParseError {
            message: format!("invalid permissions: {other:?}"),
            pos: block_pos,
        }),
    }
}

fn value_pos(map: &SourceMap, ptr: &str) -> Pos {
    map.value_pos(ptr).unwrap_or_default()
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
