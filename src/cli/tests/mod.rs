//! Unit tests for CLI module
//!
//! Tests argument parsing, formatting and the non-interactive commands.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{fs, path::PathBuf};

use clap::Parser;

use crate::{
    cli::{
        Cli, Commands, diff,
        formatting::{format_notification, format_op},
        get,
    },
    core::PropsError,
    dispatch::Notification,
    settings::{Settings, SourceSettings},
    snapshot_store::Op,
    sources::SourceFormat,
};

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn strip_ansi(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[test]
fn parses_watch_with_defaults() {
    let cli = Cli::try_parse_from(["props", "watch", "app.properties"]).unwrap();

    assert_eq!(cli.format, SourceFormat::Auto);
    assert!(cli.config.is_none());
    match cli.command {
        Commands::Watch { files, pattern } => {
            assert_eq!(files, [PathBuf::from("app.properties")]);
            assert_eq!(pattern, "*");
        }
        other => panic!("expected watch, got {other:?}"),
    }
}

#[test]
fn parses_global_options_after_subcommand() {
    let cli = Cli::try_parse_from([
        "props",
        "get",
        "server.port",
        "defaults.conf",
        "app.conf",
        "--format",
        "TOML",
        "--config",
        "settings.toml",
    ])
    .unwrap();

    assert_eq!(cli.format, SourceFormat::Toml);
    assert_eq!(cli.config, Some(PathBuf::from("settings.toml")));
    match cli.command {
        Commands::Get { key, files } => {
            assert_eq!(key, "server.port");
            assert_eq!(
                files,
                [PathBuf::from("defaults.conf"), PathBuf::from("app.conf")]
            );
        }
        other => panic!("expected get, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_format() {
    assert!(Cli::try_parse_from(["props", "--format", "yaml", "get", "a", "b"]).is_err());
}

#[test]
fn formats_each_op_kind() {
    assert_eq!(strip_ansi(&format_op(&Op::update("a", 1))), "~ a = 1");
    assert_eq!(strip_ansi(&format_op(&Op::delete("a", 1))), "- a (was 1)");

    let notification = Notification {
        generation: 7,
        op: Op::update("b", "x"),
    };
    assert_eq!(strip_ansi(&format_notification(&notification)), "[7] ~ b = x");
}

#[test]
fn diff_lists_grouped_sorted_changes() {
    let dir = tempfile::tempdir().unwrap();
    let old = write(&dir, "old.properties", "a=1\nb=2\nz=0\nkeep=same\n");
    let new = write(&dir, "new.properties", "b=3\nkeep=same\nd=4\nc=5\n");

    let output = diff(&old, &new, SourceFormat::Auto).unwrap();
    let lines: Vec<_> = output.lines().map(strip_ansi).collect();

    assert_eq!(
        lines,
        [
            "- a (was 1)",
            "- z (was 0)",
            "~ b = 3",
            "~ c = 5",
            "~ d = 4",
        ]
    );
}

#[test]
fn diff_of_identical_files_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let old = write(&dir, "a.toml", "[server]\nport = 1\n");
    let new = write(&dir, "b.toml", "[server]\nport = 1\n");

    assert!(diff(&old, &new, SourceFormat::Auto).unwrap().is_empty());
}

#[test]
fn get_reads_value_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(&dir, "app.toml", "[server]\nport = 8080\n");
    let settings = Settings::default();

    let files = [file];

    assert_eq!(
        get("server.port", &files, SourceFormat::Auto, &settings).unwrap(),
        "8080"
    );
    assert!(matches!(
        get("server.host", &files, SourceFormat::Auto, &settings),
        Err(PropsError::KeyNotFound { .. })
    ));
}

#[test]
fn get_layers_files_over_configured_sources() {
    let dir = tempfile::tempdir().unwrap();
    let defaults = write(&dir, "defaults.properties", "port=80
host=a
mode=dev
");
    let site = write(&dir, "site.toml", "port = 8080
");
    let local = write(&dir, "local.properties", "mode=prod
");

    let settings = Settings {
        sources: vec![
            SourceSettings::new(&defaults, SourceFormat::Auto),
            SourceSettings::new(&site, SourceFormat::Auto),
        ],
        ..Settings::default()
    };
    let files = [local];

    let lookup = |key: &str| get(key, &files, SourceFormat::Auto, &settings).unwrap();
    assert_eq!(lookup("port"), "8080");
    assert_eq!(lookup("host"), "a");
    assert_eq!(lookup("mode"), "prod");
}

#[test]
fn get_fails_when_any_layer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let defaults = write(&dir, "defaults.properties", "port=80
");
    let missing = dir.path().join("missing.properties");

    let settings = Settings::default();
    let files = [defaults, missing];

    assert!(matches!(
        get("port", &files, SourceFormat::Auto, &settings),
        Err(PropsError::Source(_))
    ));
}

#[test]
fn get_without_sources_is_an_error() {
    assert!(matches!(
        get("port", &[], SourceFormat::Auto, &Settings::default()),
        Err(PropsError::NoSources)
    ));
}
