use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use linta_core::walker::normalize;
use walkdir::WalkDir;

pub const GITHUB_WORKFLOWS_DIR: &str = ".github/workflows";

fn workflow_globs() -> Result<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for pat in ["*.yml", "*.yaml"] {
        b.add(Glob::new(pat).with_context(|| format!("invalid glob: {pat}"))?);
    }
    b.build().context("build workflow globs")
}

fn is_workflow_file(globs: &GlobSet, path: &Path) -> bool {
    path.file_name().is_some_and(|n| globs.is_match(n))
}

fn should_walk_dir_entry(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !matches!(name.as_ref(), ".git" | "target" | "node_modules")
}

/// Workflow files directly under `.github/workflows` of `root`, sorted.
///
/// A missing directory yields no workflows.
pub fn github_workflows(root: &Path) -> Result<Vec<PathBuf>> {
    let dir = if root == Path::new(".") {
        PathBuf::from(GITHUB_WORKFLOWS_DIR)
    } else {
        root.join(GITHUB_WORKFLOWS_DIR)
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let globs = workflow_globs()?;
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("read dir: {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir: {}", dir.display()))?
            .path();
        if path.is_file() && is_workflow_file(&globs, &path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Expands explicit inputs: files are taken as given, directories are walked
/// for `*.yml`/`*.yaml`. Duplicates are dropped, first occurrence wins.
pub fn collect_workflow_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let globs = workflow_globs()?;
    let mut out: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for input in inputs {
        if input.is_file() {
            if seen.insert(normalize(input)) {
                out.push(input.clone());
            }
            continue;
        }
        if input.is_dir() {
            let mut files: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_entry(should_walk_dir_entry)
                .flatten()
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.into_path();
                if is_workflow_file(&globs, &path) {
                    files.push(path);
                }
            }
            files.sort();
            for file in files {
                if seen.insert(normalize(&file)) {
                    out.push(file);
                }
            }
            continue;
        }

        anyhow::bail!("workflow not found: {}", input.display());
    }

    Ok(out)
}

/// Explicit inputs when given, else the repository's `.github/workflows`.
pub fn workflow_paths(root: &Path, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if inputs.is_empty() {
        github_workflows(root)
    } else {
        collect_workflow_inputs(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_text(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn github_workflows_keeps_yaml_only() {
        let root = tempfile::tempdir().unwrap();
        let wf = root.path().join(GITHUB_WORKFLOWS_DIR);
        write_text(&wf.join("b.yaml"), "jobs: {}\n");
        write_text(&wf.join("a.yml"), "jobs: {}\n");
        write_text(&wf.join("README.md"), "docs\n");
        write_text(&wf.join("nested/c.yml"), "jobs: {}\n");

        let got = github_workflows(root.path()).unwrap();
        assert_eq!(got, vec![wf.join("a.yml"), wf.join("b.yaml")]);
    }

    #[test]
    fn github_workflows_missing_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        assert!(github_workflows(root.path()).unwrap().is_empty());
    }

    #[test]
    fn collect_inputs_walks_dirs_and_dedups() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("ci/a.yml");
        let b = root.path().join("ci/sub/b.yaml");
        let skipped = root.path().join("ci/.git/c.yml");
        write_text(&a, "jobs: {}\n");
        write_text(&b, "jobs: {}\n");
        write_text(&skipped, "jobs: {}\n");
        write_text(&root.path().join("ci/notes.txt"), "x\n");

        let got = collect_workflow_inputs(&[a.clone(), root.path().join("ci")]).unwrap();
        assert_eq!(got, vec![a.clone(), b]);

        let respelled = root.path().join("ci/sub/../a.yml");
        let got = collect_workflow_inputs(&[a.clone(), respelled]).unwrap();
        assert_eq!(got, vec![a]);
    }

    #[test]
    fn collect_inputs_rejects_missing_path() {
        let root = tempfile::tempdir().unwrap();
        let err = collect_workflow_inputs(&[root.path().join("nope.yml")]).unwrap_err();
        assert!(format!("{err:#}").contains("workflow not found"));
    }
}
