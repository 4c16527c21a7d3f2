//! Unit tests for settings parsing.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{io::Write, time::Duration};

use crate::{
    core::PropsError,
    settings::{LogFormat, LogLevel, Settings, SourceSettings},
    snapshot_store::DEFAULT_SPIN_LIMIT,
    sources::SourceFormat,
};

#[test]
fn empty_document_uses_defaults() {
    let settings = Settings::from_toml_str("").unwrap();

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.refresh.interval(), Some(Duration::from_secs(1)));
    assert_eq!(settings.refresh.debounce(), Duration::from_millis(500));
    assert!(settings.refresh.watch);
    assert_eq!(settings.refresh.shutdown_grace(), Duration::from_secs(5));
    assert_eq!(settings.quiescence.policy().spin_limit, DEFAULT_SPIN_LIMIT);
    assert_eq!(settings.quiescence.policy().max_wait, None);
    assert_eq!(settings.logging.level, LogLevel::Info);
    assert_eq!(settings.logging.format, LogFormat::Pretty);
    assert!(settings.logging.directory.is_none());
}

#[test]
fn sources_are_listed_in_layer_order() {
    let settings = Settings::from_toml_str(
        r#"
        [[sources]]
        path = "/etc/app/defaults.properties"

        [[sources]]
        path = "overrides.conf"
        format = "toml"
        watch = false
        "#,
    )
    .unwrap();

    assert_eq!(
        settings.sources,
        [
            SourceSettings::new("/etc/app/defaults.properties", SourceFormat::Auto),
            SourceSettings {
                path: "overrides.conf".into(),
                format: SourceFormat::Toml,
                watch: false,
            },
        ]
    );
    assert_eq!(settings.sources[1].open().format(), SourceFormat::Toml);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let settings = Settings::from_toml_str(
        r#"
        [refresh]
        interval_ms = 0

        [quiescence]
        max_wait_ms = 250

        [logging]
        level = "debug"
        format = "json"
        directory = "/tmp/props-logs"
        "#,
    )
    .unwrap();

    assert_eq!(settings.refresh.interval(), None);
    assert_eq!(settings.refresh.debounce_ms, 500);
    assert_eq!(
        settings.quiescence.policy().max_wait,
        Some(Duration::from_millis(250))
    );
    assert_eq!(settings.quiescence.spin_limit, DEFAULT_SPIN_LIMIT);
    assert_eq!(settings.logging.level, LogLevel::Debug);
    assert_eq!(settings.logging.format, LogFormat::Json);
    assert_eq!(
        settings.logging.directory.as_deref(),
        Some(std::path::Path::new("/tmp/props-logs"))
    );
}

#[test]
fn invalid_level_is_parse_error() {
    let result = Settings::from_toml_str("[logging]\nlevel = \"loud\"\n");

    match result {
        Err(PropsError::TomlParseError { location, .. }) => assert_eq!(location, "string"),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn load_reads_file_and_reports_missing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[refresh]\nwatch = false").unwrap();

    let settings = Settings::load(file.path()).unwrap();
    assert!(!settings.refresh.watch);

    let missing = Settings::load(std::path::Path::new("/definitely/not/settings.toml"));
    assert!(matches!(missing, Err(PropsError::IoError { .. })));
}

#[test]
fn discover_prefers_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[quiescence]\nspin_limit = 3").unwrap();

    let settings = Settings::discover(Some(file.path())).unwrap();

    assert_eq!(settings.quiescence.spin_limit, 3);
}

#[test]
fn log_format_names() {
    assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
    assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
    assert_eq!(LogFormat::parse("xml"), None);
    assert_eq!(LogLevel::Trace.to_string(), "trace");
}
