//! Permission mapping: which scopes each third-party action needs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scope::{is_known_category, Scope};

pub const DEFAULT_CONFIG_PATH: &str = ".linta.yml";

const BUILTIN_CONFIG: &str = include_str!("config.builtin.yml");

/// Category -> minimum scope an action needs.
pub type PermissionConfig = BTreeMap<String, Scope>;

/// Job id -> categories whose findings are suppressed.
pub type IgnoreConfig = BTreeMap<String, Vec<String>>;

/// Answers "what does this action need?" for the derivation step.
pub trait PermissionLookup {
    /// `None` means the action is unknown, which contributes no requirements.
    fn lookup(&self, action: &str) -> Option<&PermissionConfig>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub repositories: BTreeMap<String, PermissionConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ignores: BTreeMap<String, IgnoreConfig>,
}

impl PermissionLookup for Config {
    fn lookup(&self, action: &str) -> Option<&PermissionConfig> {
        self.repositories.get(action)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CONFIG)
    }

    pub fn from_yaml(src: &str) -> Result<Self> {
        let config: Config = if src.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(src).map_err(|err| Error::config(err.to_string()))?
        };
        config.validate().map_err(Error::config)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_yaml(&src).map_err(|err| match err {
            Error::Config { message } => Error::config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Explicit path, else `.linta.yml` under `dir`, else the built-in mapping.
    pub fn lookup_from(dir: &Path, explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, ConfigSource::File(path.display().to_string())));
        }
        let default_path = dir.join(DEFAULT_CONFIG_PATH);
        if default_path.is_file() {
            return Ok((
                Self::load(&default_path)?,
                ConfigSource::File(default_path.display().to_string()),
            ));
        }
        Ok((Self::builtin()?, ConfigSource::Builtin))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|err| Error::config(err.to_string()))
    }

    pub fn update(&mut self, repository: &str, permissions: PermissionConfig) {
        self.repositories.insert(repository.to_string(), permissions);
    }

    /// Copies repository mappings from `other`; existing entries survive unless `overwrite`.
    pub fn merge(&mut self, other: &Config, overwrite: bool) {
        for (k, v) in &other.repositories {
            if self.repositories.contains_key(k) && !overwrite {
                continue;
            }
            self.repositories.insert(k.clone(), v.clone());
        }
    }

    /// Compiles the `ignores` table for repeated matching.
    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::new(&self.ignores)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        for (repository, permissions) in &self.repositories {
            validate_repository(repository)?;
            for category in permissions.keys() {
                if !is_known_category(category) {
                    return Err(format!(
                        "invalid permission scope: {category:?} (repository {repository:?})"
                    ));
                }
            }
        }
        for (pattern, jobs) in &self.ignores {
            Glob::new(pattern).map_err(|err| format!("invalid ignore pattern {pattern:?}: {err}"))?;
            for (job, categories) in jobs {
                for category in categories {
                    if !is_known_category(category) {
                        return Err(format!(
                            "invalid permission scope: {category:?} (ignores {pattern:?} job {job:?})"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (repository, permissions) in &self.repositories {
            writeln!(f, "[{repository}]")?;
            for (k, v) in permissions {
                writeln!(f, "  {k}:{v}")?;
            }
        }
        for (pattern, jobs) in &self.ignores {
            writeln!(f, "[ignore {pattern}]")?;
            for (job, categories) in jobs {
                writeln!(f, "  {job}: {}", categories.join(","))?;
            }
        }
        Ok(())
    }
}

/// Suppression table keyed by workflow path, compiled once per lint run.
///
/// Keys match the workflow path exactly or as a glob; a leading `./` is ignored on both sides.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    patterns: Vec<(String, IgnoreConfig)>,
    globs: GlobSet,
    /// Index into `patterns` for each glob in `globs`.
    glob_owner: Vec<usize>,
}

impl IgnoreRules {
    fn new(ignores: &BTreeMap<String, IgnoreConfig>) -> Self {
        let mut patterns = Vec::with_capacity(ignores.len());
        let mut builder = GlobSetBuilder::new();
        let mut glob_owner = Vec::new();
        for (pattern, jobs) in ignores {
            let trimmed = strip_dot_slash(pattern).to_string();
            // A pattern that does not compile only matches exactly.
            if let Ok(glob) = Glob::new(&trimmed) {
                builder.add(glob);
                glob_owner.push(patterns.len());
            }
            patterns.push((trimmed, jobs.clone()));
        }
        let globs = builder.build().unwrap_or_else(|_| GlobSet::empty());
        Self {
            patterns,
            globs,
            glob_owner,
        }
    }

    /// Whether findings for `category` in job `job` of workflow `path` are suppressed.
    pub fn is_ignored(&self, path: &str, job: &str, category: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let path = strip_dot_slash(path);
        let exact = self
            .patterns
            .iter()
            .enumerate()
            .filter(|(_, (pattern, _))| pattern == path)
            .map(|(i, _)| i);
        let globbed = self
            .globs
            .matches(path)
            .into_iter()
            .filter_map(|g| self.glob_owner.get(g).copied());
        exact.chain(globbed).any(|i| {
            self.patterns[i]
                .1
                .get(job)
                .is_some_and(|cats| cats.iter().any(|c| c == category))
        })
    }
}

fn strip_dot_slash(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Builtin,
    File(String),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Builtin => f.write_str("<builtin>"),
            ConfigSource::File(p) => f.write_str(p),
        }
    }
}

fn validate_repository(repository: &str) -> std::result::Result<(), String> {
    let segments: Vec<&str> = repository.split('/').collect();
    if segments.len() < 2 || segments.iter().take(2).any(|s| s.trim().is_empty()) {
        return Err(format!("invalid repository name: {repository:?}"));
    }
    if repository.contains('@') {
        return Err(format!(
            "invalid repository name (drop the @ref suffix): {repository:?}"
        ));
    }
    Ok(())
}
