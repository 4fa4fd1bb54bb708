//! Engine pipeline tests against the mock resolver.
//!
//! Each test lays out a `requirements/` tree in a temp project and runs the
//! built-in plan (or a variant of it) end to end.

use relock_core::{
    CoreError, Engine, StepDetail, StepOutcome, UpgradeObserver, UpgradeOptions,
};
use relock_runtime::mock::{MockResolver, MOCK_VERSION};
use relock_runtime::{Resolver, ResolverConfig};
use relock_schema::{LockFile, Plan, Step};
use std::fs;
use std::path::Path;

fn never() -> bool {
    false
}

const MANIFESTS: &[(&str, &str)] = &[
    ("pip", "pip\nsetuptools\nwheel\n"),
    ("pip-tools", "pip-tools\n"),
    ("base", "Django>=4.2,<5.0\nasgiref\nsqlparse\n"),
    ("doc", "-r base.in\nsphinx\n"),
    ("test", "-r base.in\npytest\npytest-django\n"),
    ("tox", "tox\n"),
    ("ci", "-r tox.in\ncoverage\n"),
];

fn write_project(root: &Path) {
    let req = root.join("requirements");
    fs::create_dir_all(&req).unwrap();
    for (name, content) in MANIFESTS {
        fs::write(req.join(format!("{name}.in")), content).unwrap();
    }
    fs::write(req.join("pip-tools.txt"), "pip-tools==7.4.1\n").unwrap();
}

fn mock(root: &Path) -> MockResolver {
    let mut config = ResolverConfig::new(root, &Plan::default().toolchain);
    config.compile_command = "make upgrade".to_owned();
    MockResolver::new(config)
}

fn engine(root: &Path) -> Engine {
    Engine::new(root).with_stop_check(never)
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl UpgradeObserver for Recorder {
    fn step_started(&mut self, index: usize, total: usize, step: &Step) {
        self.events
            .push(format!("start {}/{total} {}", index + 1, step.label()));
    }

    fn step_finished(&mut self, outcome: &StepOutcome) {
        self.events.push(format!("done {}", outcome.label));
    }

    fn step_failed(&mut self, step: &Step, _error: &CoreError) {
        self.events.push(format!("fail {}", step.label()));
    }
}

#[test]
fn default_plan_regenerates_every_lock_file() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let resolver = mock(dir.path());

    let report = engine(dir.path())
        .upgrade(
            &Plan::default(),
            &resolver,
            UpgradeOptions::default(),
            &mut Recorder::default(),
        )
        .unwrap();

    assert_eq!(report.steps.len(), 9);
    assert_eq!(report.resolver, "mock");
    assert_eq!(
        resolver.calls(),
        vec![
            "install",
            "compile:pip",
            "compile:pip-tools",
            "compile:base",
            "compile:doc",
            "compile:test",
            "compile:tox",
            "compile:ci"
        ]
    );

    for (name, _) in MANIFESTS {
        let path = dir.path().join(format!("requirements/{name}.txt"));
        assert!(path.exists(), "{} missing", path.display());
    }

    let base = LockFile::read_from_file(dir.path().join("requirements/base.txt")).unwrap();
    assert_eq!(base.find("django").unwrap().version, MOCK_VERSION);
    assert!(base.header.iter().any(|l| l.contains("make upgrade")));

    let pip = LockFile::read_from_file(dir.path().join("requirements/pip.txt")).unwrap();
    assert!(pip.find("pip").is_some(), "pip.txt is compiled with --allow-unsafe");
    assert!(pip.find("setuptools").is_some());
}

#[test]
fn test_lock_file_loses_only_the_django_pin() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());

    let report = engine(dir.path())
        .upgrade(
            &Plan::default(),
            &mock(dir.path()),
            UpgradeOptions::default(),
            &mut Recorder::default(),
        )
        .unwrap();

    let content = fs::read_to_string(dir.path().join("requirements/test.txt")).unwrap();
    let pinned = format!("django=={MOCK_VERSION}");
    assert!(!content.lines().any(|l| l == pinned));
    assert!(content.contains(&format!("pytest-django=={MOCK_VERSION}")));
    assert!(content.contains(&format!("asgiref=={MOCK_VERSION}")));

    let doc = LockFile::read_from_file(dir.path().join("requirements/doc.txt")).unwrap();
    assert!(doc.find("django").is_some(), "only test.txt is filtered");

    match &report.steps.last().unwrap().detail {
        StepDetail::Stripped { file, removed } => {
            assert_eq!(file, Path::new("requirements/test.txt"));
            assert_eq!(removed, &vec![format!("django=={MOCK_VERSION}")]);
        }
        other => panic!("last step should strip, got {other:?}"),
    }
}

#[test]
fn failure_aborts_remaining_steps_without_rollback() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    fs::remove_file(dir.path().join("requirements/doc.in")).unwrap();
    fs::write(dir.path().join("requirements/ci.txt"), "coverage==7.0\n").unwrap();

    let resolver = mock(dir.path());
    let mut recorder = Recorder::default();
    let err = engine(dir.path())
        .upgrade(
            &Plan::default(),
            &resolver,
            UpgradeOptions::default(),
            &mut recorder,
        )
        .unwrap_err();

    assert_eq!(err.step_exit_code(), Some(2));
    assert!(err.command_output().unwrap().contains("doc.in"));
    assert_eq!(resolver.calls().last().unwrap(), "compile:doc");
    assert_eq!(
        recorder.events.last().unwrap(),
        "fail compile requirements/doc.txt"
    );

    // Earlier outputs stay, later ones are never produced or touched.
    assert!(dir.path().join("requirements/base.txt").exists());
    assert!(!dir.path().join("requirements/test.txt").exists());
    assert!(!dir.path().join("requirements/tox.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("requirements/ci.txt")).unwrap(),
        "coverage==7.0\n"
    );
}

#[test]
fn missing_toolchain_fails_before_any_compile() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    fs::remove_file(dir.path().join("requirements/pip-tools.txt")).unwrap();

    let resolver = mock(dir.path());
    let err = engine(dir.path())
        .upgrade(
            &Plan::default(),
            &resolver,
            UpgradeOptions::default(),
            &mut Recorder::default(),
        )
        .unwrap_err();

    assert_eq!(err.step_exit_code(), Some(1));
    assert_eq!(resolver.calls(), vec!["install"]);
    assert!(!dir.path().join("requirements/pip.txt").exists());
}

#[test]
fn skip_install_runs_compiles_only() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    fs::remove_file(dir.path().join("requirements/pip-tools.txt")).unwrap();

    let resolver = mock(dir.path());
    let report = engine(dir.path())
        .upgrade(
            &Plan::default(),
            &resolver,
            UpgradeOptions {
                skip_install: true,
                ..UpgradeOptions::default()
            },
            &mut Recorder::default(),
        )
        .unwrap();

    assert_eq!(report.steps.len(), 8);
    assert!(!resolver.calls().contains(&"install".to_owned()));
}

#[test]
fn observer_sees_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let mut recorder = Recorder::default();

    engine(dir.path())
        .upgrade(
            &Plan::default(),
            &mock(dir.path()),
            UpgradeOptions::default(),
            &mut recorder,
        )
        .unwrap();

    assert_eq!(recorder.events.len(), 18);
    assert_eq!(recorder.events[0], "start 1/9 install toolchain");
    assert_eq!(recorder.events[1], "done install toolchain");
    assert_eq!(
        recorder.events[16],
        "start 9/9 strip requirements/test.txt"
    );
}

#[test]
fn rerun_reports_unchanged_lock_files() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let engine = engine(dir.path());
    let resolver = mock(dir.path());
    let run = |resolver: &dyn Resolver| {
        engine
            .upgrade(
                &Plan::default(),
                resolver,
                UpgradeOptions::default(),
                &mut Recorder::default(),
            )
            .unwrap()
    };

    let first = run(&resolver);
    assert_eq!(first.changed_lock_files().len(), 8);

    let second = run(&resolver);
    let changed: Vec<String> = second
        .changed_lock_files()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    // test.txt is rewritten with the pin and filtered again on every run.
    assert_eq!(
        changed,
        vec!["requirements/test.txt", "requirements/test.txt"]
    );
}

#[test]
fn report_serializes_with_step_kinds() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());

    let report = engine(dir.path())
        .upgrade(
            &Plan::default(),
            &mock(dir.path()),
            UpgradeOptions::default(),
            &mut Recorder::default(),
        )
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps[0]["kind"], "installed");
    assert_eq!(steps[1]["kind"], "compiled");
    assert_eq!(steps[1]["name"], "pip");
    assert_eq!(steps[8]["kind"], "stripped");
    assert_eq!(steps[8]["file"], "requirements/test.txt");
}

#[test]
fn invalid_plan_is_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let mut plan = Plan::default();
    plan.compile.clear();

    let resolver = mock(dir.path());
    let err = engine(dir.path())
        .upgrade(
            &plan,
            &resolver,
            UpgradeOptions::default(),
            &mut Recorder::default(),
        )
        .unwrap_err();

    assert!(matches!(err, CoreError::Plan(_)));
    assert!(resolver.calls().is_empty());
}
