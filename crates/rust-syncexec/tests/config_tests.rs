//! Integration tests for executor configuration loading.

use std::path::PathBuf;
use std::time::Duration;

use rust_syncexec::config::env::EnvConfig;
use rust_syncexec::config::file::{ConfigFile, ConfigLoader};
use rust_syncexec::{
    CommandInvocation, ExecError, ExecutorConfig, LineBuffering, PromptResponder, ReplySource,
};

const SAMPLE: &str = r#"
grace_period_ms = 25
line_buffering = "buffered"
structured_output_flags = ["--dump", "--print-state"]

[[prompt]]
trigger = "continue sync setup"
source = "input"
default = "yes"

[[prompt]]
trigger = "accept licence"
source = "fixed"
default = "accept"
close_stdin = true
"#;

#[test]
fn file_then_env_layering() {
    let mut config = ExecutorConfig::default();
    ConfigFile::parse(SAMPLE).unwrap().apply(&mut config);

    let env = EnvConfig::with_lookup("SYNCEXEC", |name| match name {
        "SYNCEXEC_GRACE_PERIOD_MS" => Some("75".to_string()),
        "SYNCEXEC_WORKING_DIR" => Some("/srv/sync".to_string()),
        _ => None,
    });
    env.apply(&mut config).unwrap();

    assert_eq!(config.grace_period, Duration::from_millis(75));
    assert_eq!(config.line_buffering, LineBuffering::Buffered);
    assert_eq!(config.spawn.working_directory, Some(PathBuf::from("/srv/sync")));
    assert_eq!(config.structured_output_flags, vec!["--dump", "--print-state"]);
    assert_eq!(config.prompt_rules.len(), 2);
    assert_eq!(config.prompt_rules[1].source, ReplySource::Fixed);
}

#[test]
fn file_prompts_resolve_against_invocation() {
    let mut config = ExecutorConfig::default();
    ConfigFile::parse(SAMPLE).unwrap().apply(&mut config);

    let invocation = CommandInvocation::new("sync-tool").input("no");
    let responder = PromptResponder::new(&config.prompt_rules, &invocation);
    let replies: Vec<_> = responder
        .prompts()
        .iter()
        .map(|p| (p.reply.as_str(), p.close_stdin))
        .collect();

    assert_eq!(replies, vec![("no", false), ("accept", true)]);
}

#[test]
fn from_file_reads_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("syncexec.toml");
    std::fs::write(&path, "read_buffer_size = 1024\n").unwrap();

    let config = ExecutorConfig::from_file(&path).unwrap();
    assert_eq!(config.read_buffer_size, 1024);
}

#[test]
fn missing_file_is_a_config_error() {
    let err = ExecutorConfig::from_file("/no/such/syncexec.toml").unwrap_err();
    assert!(matches!(err, ExecError::Config { .. }));
}

#[test]
fn loader_prefers_first_search_path() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    std::fs::write(first.path().join("syncexec.toml"), "grace_period_ms = 1").unwrap();
    std::fs::write(second.path().join("syncexec.toml"), "grace_period_ms = 2").unwrap();

    let config = ConfigLoader::new()
        .add_path(first.path())
        .add_path(second.path())
        .load_or_default("syncexec")
        .unwrap();

    assert_eq!(config.grace_period, Duration::from_millis(1));
}

#[test]
fn bad_line_buffering_is_rejected() {
    let err = ConfigFile::parse(r#"line_buffering = "sometimes""#).unwrap_err();
    assert!(matches!(err, ExecError::Config { .. }));

    let env = EnvConfig::with_lookup("SYNCEXEC", |name| {
        (name == "SYNCEXEC_LINE_BUFFERING").then(|| "sometimes".to_string())
    });
    let err = env.apply(&mut ExecutorConfig::default()).unwrap_err();
    assert!(err.to_string().contains("unknown line buffering mode"));
}
