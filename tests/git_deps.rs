// tests/git_deps.rs

mod common;
use crate::common::builders::LockfileBuilder;
use crate::common::fakes::{FakeRefLister, RecordingConsole, RecordingRefetcher};
use crate::common::{init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;

use devtask::deps::{
    Action, CommandRefetcher, DeclaredSource, GitDependencyResolver, Lockfile, Manifest, Reason,
    load_inputs,
};
use devtask::errors::DevtaskError;
use devtask::exec::{ProcessRegistry, ProcessRunner};
use devtask::fs::mock::MockFileSystem;

const URL: &str = "https://github.com/acme/widgets.git";
const DECLARED: &str = "https://github.com/acme/widgets.git#main";

fn resolver(lister: &FakeRefLister) -> GitDependencyResolver {
    init_tracing();
    GitDependencyResolver::new(Arc::new(lister.clone()))
}

fn manifest(deps: &[(&str, &str)]) -> Manifest {
    let mut manifest = Manifest::default();
    for (name, declared) in deps {
        manifest
            .dependencies
            .insert(name.to_string(), declared.to_string());
    }
    manifest
}

fn lockfile_at(commit: &str) -> Lockfile {
    let text = LockfileBuilder::new()
        .entry("widgets", DECLARED, Some(&format!("{URL}#{commit}")))
        .build();
    Lockfile::parse(&text).unwrap()
}

#[tokio::test]
async fn test_dependency_at_remote_tip_is_skipped() {
    let lister = FakeRefLister::new().with_listing(URL, "abc123\trefs/heads/main\n");
    let resolver = resolver(&lister);

    let decision = resolver
        .decide("widgets", DECLARED, &lockfile_at("abc123"))
        .await
        .unwrap();

    assert_eq!(decision.action, Action::Skip);
    assert_eq!(
        decision.reason,
        Reason::UpToDate {
            commit: "abc123".into()
        }
    );
    assert_eq!(lister.calls(), vec![URL.to_string()]);
}

#[tokio::test]
async fn test_moved_remote_tip_triggers_refetch() {
    let lister = FakeRefLister::new().with_listing(URL, "def456\trefs/heads/main\n");
    let resolver = resolver(&lister);

    let decision = resolver
        .decide("widgets", DECLARED, &lockfile_at("abc123"))
        .await
        .unwrap();

    assert_eq!(decision.action, Action::Refetch);
    assert_eq!(decision.reason, Reason::Outdated { tip: "def456".into() });
}

#[tokio::test]
async fn test_missing_lockfile_entry_refetches_without_remote_query() {
    let lister = FakeRefLister::new().with_listing(URL, "abc123\trefs/heads/main\n");
    let resolver = resolver(&lister);

    let decision = resolver
        .decide("widgets", DECLARED, &Lockfile::default())
        .await
        .unwrap();

    assert_eq!(decision.action, Action::Refetch);
    assert_eq!(decision.reason, Reason::Unresolved);
    assert!(lister.calls().is_empty());
}

#[tokio::test]
async fn test_entry_without_resolved_value_is_unresolved() {
    let text = LockfileBuilder::new().entry("widgets", DECLARED, None).build();
    let lockfile = Lockfile::parse(&text).unwrap();
    let resolver = resolver(&FakeRefLister::new());

    let decision = resolver.decide("widgets", DECLARED, &lockfile).await.unwrap();

    assert_eq!(decision.reason, Reason::Unresolved);
}

#[tokio::test]
async fn test_lockfile_key_must_match_declared_source_exactly() {
    // Pinned for `#develop`, but the manifest now asks for `#main`.
    let text = LockfileBuilder::new()
        .entry("widgets", &format!("{URL}#develop"), Some(&format!("{URL}#abc123")))
        .build();
    let lockfile = Lockfile::parse(&text).unwrap();
    let resolver = resolver(&FakeRefLister::new());

    let decision = resolver.decide("widgets", DECLARED, &lockfile).await.unwrap();

    assert_eq!(decision.reason, Reason::Unresolved);
}

#[tokio::test]
async fn test_registry_dependency_is_never_checked() {
    let lister = FakeRefLister::new();
    let resolver = resolver(&lister);

    let decision = resolver
        .decide("left-pad", "^1.3.0", &Lockfile::default())
        .await
        .unwrap();

    assert_eq!(decision.action, Action::Skip);
    assert_eq!(decision.reason, Reason::NotGit);
    assert!(lister.calls().is_empty());
}

#[tokio::test]
async fn test_unmatched_ref_is_ambiguous() {
    let lister = FakeRefLister::new().with_listing(URL, "abc123\trefs/heads/develop\n");
    let resolver = resolver(&lister);

    let decision = resolver
        .decide("widgets", DECLARED, &lockfile_at("abc123"))
        .await
        .unwrap();

    assert_eq!(decision.action, Action::Refetch);
    assert_eq!(decision.reason, Reason::AmbiguousRef(0));
}

#[tokio::test]
async fn test_ref_matching_several_lines_is_ambiguous() {
    let listing = "abc123\trefs/heads/main\n999999\trefs/heads/domain\n";
    let lister = FakeRefLister::new().with_listing(URL, listing);
    let resolver = resolver(&lister);

    let decision = resolver
        .decide("widgets", DECLARED, &lockfile_at("abc123"))
        .await
        .unwrap();

    assert_eq!(decision.action, Action::Refetch);
    assert_eq!(decision.reason, Reason::AmbiguousRef(2));
}

#[tokio::test]
async fn test_source_without_fragment_tracks_head() {
    let lister = FakeRefLister::new().with_listing(
        URL,
        "abc123\tHEAD\nabc123\trefs/heads/main\n777777\trefs/tags/v1\n",
    );
    let resolver = resolver(&lister);
    let text = LockfileBuilder::new()
        .entry("widgets", URL, Some(&format!("{URL}#abc123")))
        .build();
    let lockfile = Lockfile::parse(&text).unwrap();

    let decision = resolver.decide("widgets", URL, &lockfile).await.unwrap();

    assert_eq!(decision.action, Action::Skip);
}

#[tokio::test]
async fn test_git_plus_source_is_listed_without_scheme_prefix() {
    let declared = format!("git+{DECLARED}");
    let lister = FakeRefLister::new().with_listing(URL, "abc123\trefs/heads/main\n");
    let resolver = resolver(&lister);
    // The lockfile key keeps the declared string verbatim.
    let text = LockfileBuilder::new()
        .entry("widgets", &declared, Some(&format!("git+{URL}#abc123")))
        .build();
    let lockfile = Lockfile::parse(&text).unwrap();

    let decision = resolver.decide("widgets", &declared, &lockfile).await.unwrap();

    assert_eq!(lister.calls(), vec![URL.to_string()]);
    assert_eq!(decision.declared, declared);
    assert_eq!(decision.action, Action::Skip);
}

#[tokio::test]
async fn test_ref_listing_failure_propagates() {
    let lister = FakeRefLister::new();
    let resolver = resolver(&lister);

    let err = resolver
        .decide("widgets", DECLARED, &lockfile_at("abc123"))
        .await
        .unwrap_err();

    assert!(matches!(err, DevtaskError::RefQuery { url, .. } if url == URL));
}

#[tokio::test]
async fn test_upgrade_refetches_stale_dependencies_in_order() {
    let other_url = "git+ssh://git@github.com/acme/gadgets.git";
    let other = format!("{other_url}#v2");
    let lister = FakeRefLister::new()
        .with_listing(URL, "def456\trefs/heads/main\n")
        .with_listing("ssh://git@github.com/acme/gadgets.git", "111111\trefs/tags/v2\n");
    let resolver = resolver(&lister);

    let text = LockfileBuilder::new()
        .entry("widgets", DECLARED, Some(&format!("{URL}#abc123")))
        .entry("gadgets", &other, Some(&format!("{other_url}#111111")))
        .build();
    let lockfile = Lockfile::parse(&text).unwrap();
    let manifest = manifest(&[
        ("zeta", "git@github.com:acme/zeta.git#main"),
        ("widgets", DECLARED),
        ("left-pad", "^1.3.0"),
        ("gadgets", &other),
    ]);
    let refetcher = RecordingRefetcher::new();

    let decisions = with_timeout(resolver.upgrade(&manifest, &lockfile, &refetcher))
        .await
        .unwrap();

    let actions: Vec<_> = decisions
        .iter()
        .map(|d| (d.name.as_str(), d.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            ("zeta", Action::Refetch),
            ("widgets", Action::Refetch),
            ("left-pad", Action::Skip),
            ("gadgets", Action::Skip),
        ]
    );
    assert_eq!(refetcher.refetched(), vec!["zeta", "widgets"]);
}

#[tokio::test]
async fn test_first_refetch_failure_aborts_the_rest() {
    let lister = FakeRefLister::new();
    let resolver = resolver(&lister);
    let manifest = manifest(&[
        ("one", "https://example.com/one.git#main"),
        ("two", "https://example.com/two.git#main"),
        ("three", "https://example.com/three.git#main"),
    ]);
    let refetcher = RecordingRefetcher::new().fail_on("two");

    let err = resolver
        .upgrade(&manifest, &Lockfile::default(), &refetcher)
        .await
        .unwrap_err();

    match err {
        DevtaskError::RefetchFailure { name, declared, .. } => {
            assert_eq!(name, "two");
            assert_eq!(declared, "https://example.com/two.git#main");
        }
        other => panic!("expected RefetchFailure, got {other:?}"),
    }
    // Earlier refetches stay; later ones never run.
    assert_eq!(refetcher.refetched(), vec!["one"]);
}

#[tokio::test]
async fn test_resolve_staleness_never_refetches() {
    let lister = FakeRefLister::new().with_listing(URL, "def456\trefs/heads/main\n");
    let resolver = resolver(&lister);
    let manifest = manifest(&[("widgets", DECLARED)]);

    let decisions = resolver
        .resolve_staleness(&manifest, &lockfile_at("abc123"))
        .await
        .unwrap();

    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].action, Action::Refetch);
}

#[test]
fn test_declared_source_classification() {
    assert_eq!(
        DeclaredSource::parse(DECLARED),
        DeclaredSource::Git {
            url: URL.into(),
            reference: "main".into()
        }
    );
    assert_eq!(
        DeclaredSource::parse("git@github.com:acme/zeta.git#v1.0"),
        DeclaredSource::Git {
            url: "git@github.com:acme/zeta.git".into(),
            reference: "v1.0".into()
        }
    );
    assert_eq!(
        DeclaredSource::parse("https://example.com/x.git#"),
        DeclaredSource::Git {
            url: "https://example.com/x.git".into(),
            reference: "HEAD".into()
        }
    );
    assert_eq!(
        DeclaredSource::parse("git+https://github.com/acme/widgets.git#main"),
        DeclaredSource::Git {
            url: URL.into(),
            reference: "main".into()
        }
    );
    assert!(!DeclaredSource::parse("^2.0.0").is_git());
    assert!(!DeclaredSource::parse("npm:other@1.0.0").is_git());
    assert!(!DeclaredSource::parse("file:../local").is_git());
}

#[test]
fn test_lockfile_parser_reads_realistic_yarn_lock() {
    let text = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.12.13.tgz#dcfc826beef65e75c50e21d3837d7d95798dd658"
  integrity sha512-HV1Cm0Q3ZrpCR93tkWOYiuYIgLxZXZFVG2VgK+MBWjUqZTundupbfx2aXarXuw5Ko5aMcjtJgbSs4vUGBS5v6g==
  dependencies:
    "@babel/highlight" "^7.12.13"

widgets@https://github.com/acme/widgets.git#main:
  version "0.4.1"
  resolved "https://github.com/acme/widgets.git#abc123"
"#;

    let lockfile = Lockfile::parse(text).unwrap();

    assert_eq!(lockfile.len(), 3);
    let babel = lockfile.get("@babel/code-frame", "^7.10.4").unwrap();
    assert_eq!(babel.version.as_deref(), Some("7.12.13"));
    assert_eq!(lockfile.get("@babel/code-frame", "^7.0.0"), Some(babel));
    assert_eq!(
        lockfile.resolved("widgets", DECLARED),
        Some("https://github.com/acme/widgets.git#abc123")
    );
}

#[test]
fn test_lockfile_parser_rejects_garbage() {
    let err = Lockfile::parse("  version \"1.0.0\"\n").unwrap_err();
    assert!(matches!(err, DevtaskError::LockfileParse { line: 1, .. }));

    let err = Lockfile::parse("foo@^1.0.0\n  version \"1\"\n").unwrap_err();
    assert!(matches!(err, DevtaskError::LockfileParse { line: 1, .. }));
}

#[test]
fn test_manifest_keeps_declaration_order() {
    let manifest = Manifest::parse(
        r#"{
            "name": "app",
            "dependencies": { "zeta": "1.0.0", "alpha": "2.0.0", "mid": "git://x/y.git" },
            "devDependencies": { "jest": "29.0.0" }
        }"#,
    )
    .unwrap();

    let names: Vec<_> = manifest.dependencies.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_load_inputs_tolerates_missing_lockfile() {
    let fs = MockFileSystem::new();
    fs.add_file("/app/package.json", r#"{"dependencies": {"a": "1.0.0"}}"#);

    let (manifest, lockfile) = load_inputs(
        &fs,
        Path::new("/app/package.json"),
        Path::new("/app/yarn.lock"),
    )
    .unwrap();

    assert_eq!(manifest.dependencies.len(), 1);
    assert!(lockfile.is_empty());
}

#[test]
fn test_load_inputs_reports_manifest_path() {
    let fs = MockFileSystem::new();
    fs.add_file("/app/package.json", "{ not json");

    let err = load_inputs(
        &fs,
        Path::new("/app/package.json"),
        Path::new("/app/yarn.lock"),
    )
    .unwrap_err();

    assert!(matches!(err, DevtaskError::ManifestError(msg) if msg.contains("/app/package.json")));
}

#[test]
fn test_refetch_command_is_quoted() {
    let runner = ProcessRunner::new(ProcessRegistry::new(), Arc::new(RecordingConsole::new()));
    let refetcher = CommandRefetcher::new(runner, "yarn add {source} # {name}");

    assert_eq!(
        refetcher.command_for("@acme/widgets", "git@github.com:acme/w.git#main"),
        "yarn add 'git@github.com:acme/w.git#main' # @acme/widgets"
    );
}

#[tokio::test]
async fn test_command_refetcher_surfaces_failure() {
    use devtask::deps::Refetcher;

    let runner = ProcessRunner::new(ProcessRegistry::new(), Arc::new(RecordingConsole::new()));
    let ok = CommandRefetcher::new(runner.clone(), "test -n {name}");
    with_timeout(ok.refetch("widgets", DECLARED)).await.unwrap();

    let failing = CommandRefetcher::new(runner, "false {name} || exit 4");
    let err = with_timeout(failing.refetch("widgets", DECLARED))
        .await
        .unwrap_err();
    assert!(matches!(err, DevtaskError::NonZeroExit { code: 4, .. }));
}
