use crate::cli::{Cli, Command};

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use googletest::assert_that;
use googletest::prelude::{eq, none};

#[test]
fn given_cli_definition_when_asserted_then_valid() {
    Cli::command().debug_assert();
}

#[test]
fn given_no_arguments_when_parse_then_run_is_default() {
    let cli = Cli::try_parse_from(["warden"]).unwrap();

    assert_that!(cli.command, none());
    assert_that!(cli.action(), eq(Command::Run));
    assert_eq!(cli.config_dir, None);
}

#[test]
fn given_check_with_config_dir_when_parse_then_both_captured() {
    let cli = Cli::try_parse_from(["warden", "check", "--config-dir", "/etc/warden"]).unwrap();

    assert_that!(cli.action(), eq(Command::Check));
    assert_eq!(cli.config_dir, Some(PathBuf::from("/etc/warden")));
}

#[test]
fn given_config_dir_before_subcommand_when_parse_then_accepted() {
    let cli = Cli::try_parse_from(["warden", "--config-dir", "conf", "sweep"]).unwrap();

    assert_that!(cli.action(), eq(Command::Sweep));
    assert_eq!(cli.config_dir, Some(PathBuf::from("conf")));
}

#[test]
fn given_unknown_subcommand_when_parse_then_error() {
    assert!(Cli::try_parse_from(["warden", "restart"]).is_err());
}
