// tests/cli_args.rs

use std::path::PathBuf;

use clap::Parser;
use devtask::cli::{CliArgs, Command};

#[test]
fn test_exec_takes_trailing_command() {
    let args = CliArgs::try_parse_from([
        "devtask", "exec", "--cwd", "web", "--title", "build", "--", "npm", "run", "build",
    ])
    .unwrap();

    match args.command {
        Command::Exec {
            cwd,
            title,
            command,
            no_shell,
            ..
        } => {
            assert_eq!(cwd, Some(PathBuf::from("web")));
            assert_eq!(title.as_deref(), Some("build"));
            assert_eq!(command, vec!["npm", "run", "build"]);
            assert!(!no_shell);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_quiet_requires_log() {
    assert!(CliArgs::try_parse_from(["devtask", "exec", "--quiet", "--", "true"]).is_err());
    assert!(
        CliArgs::try_parse_from(["devtask", "exec", "--quiet", "--log", "x.log", "--", "true"])
            .is_ok()
    );
}

#[test]
fn test_global_config_after_subcommand() {
    let args =
        CliArgs::try_parse_from(["devtask", "wait-port", "8080", "--name", "api", "--config", "ci.toml"])
            .unwrap();

    assert_eq!(args.config, Some(PathBuf::from("ci.toml")));
    assert!(matches!(
        args.command,
        Command::WaitPort { port: 8080, timeout: None, name: Some(ref n) } if n == "api"
    ));
}

#[test]
fn test_run_requires_steps() {
    assert!(CliArgs::try_parse_from(["devtask", "run"]).is_err());

    let args = CliArgs::try_parse_from(["devtask", "run", "api", "test"]).unwrap();
    assert!(matches!(args.command, Command::Run { ref steps } if steps == &["api", "test"]));
}

#[test]
fn test_git_check_defaults_to_current_directory() {
    let args = CliArgs::try_parse_from(["devtask", "git-check"]).unwrap();
    assert!(matches!(args.command, Command::GitCheck { ref dir } if dir == &PathBuf::from(".")));

    let args = CliArgs::try_parse_from(["devtask", "upgrade-git", "--dry-run"]).unwrap();
    assert!(matches!(args.command, Command::UpgradeGit { dry_run: true }));
}
