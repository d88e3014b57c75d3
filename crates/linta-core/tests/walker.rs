use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use linta_core::collect::build_config;
use linta_core::config::Config;
use linta_core::lint::Linter;
use linta_core::permissions::JobPermissions;
use linta_core::walker::{JobContext, WorkflowProcessor, WorkflowWalker};
use linta_core::workflow::Job;
use linta_core::Error;

fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write workflow");
    path
}

/// Counts how often each (file, job) pair is handed to the processor.
#[derive(Default)]
struct Counter {
    seen: BTreeMap<String, usize>,
}

impl WorkflowProcessor for Counter {
    fn on_job(&mut self, ctx: &JobContext<'_>, job: &Job) -> linta_core::Result<JobPermissions> {
        let file = ctx
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        *self.seen.entry(format!("{file}#{}", job.id)).or_default() += 1;
        Ok(JobPermissions::new())
    }
}

fn diamond(dir: &Path) -> PathBuf {
    write_file(
        dir,
        "b.yml",
        "\
jobs:
  leaf:
    permissions:
      issues: write
",
    );
    write_file(
        dir,
        "c.yml",
        "\
jobs:
  via-c:
    permissions: {}
    uses: ./b.yml
",
    );
    write_file(
        dir,
        "a.yml",
        "\
jobs:
  direct:
    permissions: {}
    uses: ./b.yml
  indirect:
    permissions: {}
    uses: ./c.yml
",
    )
}

#[test]
fn diamond_walks_shared_callee_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = diamond(dir.path());

    let mut counter = Counter::default();
    let mut walker = WorkflowWalker::with_root(dir.path());
    walker.walk(&a, &mut counter).expect("walk");
    assert_eq!(counter.seen.get("b.yml#leaf"), Some(&1));
    assert_eq!(counter.seen.get("c.yml#via-c"), Some(&1));
    assert_eq!(counter.seen.get("a.yml#direct"), Some(&1));
    assert_eq!(counter.seen.get("a.yml#indirect"), Some(&1));

    let config = Config::new();
    let mut linter = Linter::with_root(&config, dir.path());
    linter.lint(&a).expect("lint");
    let from_b: Vec<_> = linter
        .errors()
        .iter()
        .filter(|d| d.filepath.ends_with("b.yml"))
        .collect();
    assert_eq!(from_b.len(), 1, "{:?}", linter.errors());
    assert_eq!(
        from_b[0].message,
        "job leaf has excessive permission: issues:write"
    );
}

#[test]
fn self_call_terminates_and_reports_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_file(
        dir.path(),
        "a.yml",
        "\
jobs:
  again:
    permissions: {}
    uses: ./a.yml
  triage:
    permissions:
      issues: write
",
    );
    let config = Config::new();
    let mut linter = Linter::with_root(&config, dir.path());
    linter.lint(&a).expect("lint");
    let messages: Vec<&str> = linter.errors().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["job triage has excessive permission: issues:write"]
    );
}

#[test]
fn mutual_recursion_terminates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_file(dir.path(), "a.yml", "jobs:\n  to-b:\n    uses: ./b.yml\n");
    write_file(dir.path(), "b.yml", "jobs:\n  to-a:\n    uses: ./a.yml\n");

    let mut counter = Counter::default();
    let mut walker = WorkflowWalker::with_root(dir.path());
    walker.walk(&a, &mut counter).expect("walk");
    assert_eq!(counter.seen.len(), 2);
    assert!(counter.seen.values().all(|n| *n == 1));
    assert!(walker.is_recorded(&dir.path().join("./b.yml")));
}

#[test]
fn missing_and_remote_callees_do_not_stop_the_walk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_file(
        dir.path(),
        "a.yml",
        "\
jobs:
  local-missing:
    permissions:
      contents: write
    uses: ./missing.yml
  remote:
    permissions:
      contents: write
    uses: octo-org/shared/.github/workflows/release.yml@main
  triage:
    permissions:
      issues: write
",
    );
    let config = Config::new();
    let mut linter = Linter::with_root(&config, dir.path());
    linter.lint(&a).expect("lint");
    let messages: Vec<&str> = linter.errors().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["job triage has excessive permission: issues:write"]
    );
}

#[test]
fn callee_requirements_flow_to_the_caller() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "publish.yml",
        "\
jobs:
  upload:
    permissions:
      contents: write
    steps:
      - uses: softprops/action-gh-release@v2
",
    );
    let a = write_file(
        dir.path(),
        "release.yml",
        "\
jobs:
  release:
    permissions:
      contents: read
      pages: write
    uses: ./publish.yml
",
    );
    let config = Config::from_yaml(
        "repositories:\n  softprops/action-gh-release:\n    contents: write\n",
    )
    .expect("config");
    let mut linter = Linter::with_root(&config, dir.path());
    linter.lint(&a).expect("lint");
    let errors = linter.errors();
    let messages: Vec<&str> = errors.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "job release has excessive permission: pages:write",
            "job release has insufficient permission: contents:write (required by ./publish.yml)",
        ]
    );
    assert_eq!((errors[1].line, errors[1].column), (6, 11));
    assert!(errors[1].filepath.ends_with("release.yml"));
}

#[test]
fn callee_parse_failure_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "bad.yml", "jobs:\n  x: [unclosed\n");
    let a = write_file(
        dir.path(),
        "a.yml",
        "jobs:\n  call:\n    uses: ./bad.yml\n",
    );
    let config = Config::new();
    let mut linter = Linter::with_root(&config, dir.path());
    let err = linter.lint(&a).expect_err("must fail");
    match err {
        Error::Parse { path, .. } => assert!(path.ends_with("bad.yml"), "{}", path.display()),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn missing_top_level_file_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::new();
    let mut linter = Linter::with_root(&config, dir.path());
    let err = linter
        .lint(&dir.path().join("nope.yml"))
        .expect_err("must fail");
    assert!(matches!(err, Error::Io { .. }), "{err}");
}

#[test]
fn separate_walkers_do_not_share_visited_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = diamond(dir.path());
    for _ in 0..2 {
        let mut counter = Counter::default();
        let mut walker = WorkflowWalker::with_root(dir.path());
        walker.walk(&a, &mut counter).expect("walk");
        assert_eq!(counter.seen.get("b.yml#leaf"), Some(&1));
    }
}

#[test]
fn build_config_seeds_every_action_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "shared.yml",
        "\
jobs:
  lint:
    steps:
      - uses: actions/setup-go@v5
      - uses: docker://alpine:3.19
      - uses: ./.github/actions/local
",
    );
    let a = write_file(
        dir.path(),
        "ci.yml",
        "\
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: actions/checkout@v3
      - run: make
  shared:
    uses: ./shared.yml
",
    );
    let config = build_config(dir.path(), &[a.clone(), a]).expect("build config");
    let names: Vec<&str> = config.repositories.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["actions/checkout", "actions/setup-go"]);
    assert!(config.repositories.values().all(|p| p.is_empty()));
}

#[cfg(unix)]
#[test]
fn self_call_through_another_spelling_is_walked_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let real = dir.path().join("real");
    std::fs::create_dir_all(&real).expect("create dir");
    write_file(
        &real,
        "a.yml",
        "\
jobs:
  again:
    permissions: {}
    uses: ./a.yml
  triage:
    permissions:
      issues: write
",
    );
    let alias = dir.path().join("alias");
    std::os::unix::fs::symlink(&real, &alias).expect("symlink");

    let config = Config::new();
    let mut linter = Linter::with_root(&config, real.clone());
    linter.lint(&alias.join("a.yml")).expect("lint");
    let messages: Vec<&str> = linter.errors().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["job triage has excessive permission: issues:write"]
    );
}

#[test]
fn callee_findings_precede_the_calling_job() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "b.yml",
        "jobs:\n  leaf:\n    permissions:\n      pages: write\n",
    );
    let a = write_file(
        dir.path(),
        "a.yml",
        "\
jobs:
  caller:
    permissions:
      issues: write
    uses: ./b.yml
",
    );
    let config = Config::new();
    let mut linter = Linter::with_root(&config, dir.path());
    linter.lint(&a).expect("lint");
    let messages: Vec<&str> = linter.errors().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "job leaf has excessive permission: pages:write",
            "job caller has excessive permission: issues:write",
        ]
    );
}
