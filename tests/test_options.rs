//! Engine options: environment overlay and child environment

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use kodegen_claude_director::types::options::{BLOCKED_ENV_VARS, ENDPOINT_ENV_VAR};
use kodegen_claude_director::{ControlEndpoint, DirectorError, EngineOptions};

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn overlay_applies_every_known_variable() {
    let options = EngineOptions::default()
        .overlay_env(vars(&[
            ("CLAUDE_DIRECTOR_EXECUTABLE", "/opt/claude/bin/claude"),
            ("CLAUDE_DIRECTOR_ENDPOINT", "tcp://127.0.0.1:5555"),
            ("CLAUDE_DIRECTOR_STATE_FILE", "/tmp/sessions.json"),
            ("CLAUDE_DIRECTOR_BUFFER_BYTES", "4096"),
            ("CLAUDE_DIRECTOR_SHUTDOWN_TIMEOUT_MS", "1500"),
            ("CLAUDE_DIRECTOR_RESUME_FLAG", "--resume"),
        ]))
        .unwrap();

    assert_eq!(options.executable, "/opt/claude/bin/claude");
    assert_eq!(options.endpoint, ControlEndpoint::loopback(5555));
    assert_eq!(options.state_file, Some(PathBuf::from("/tmp/sessions.json")));
    assert_eq!(options.buffer_capacity, 4096);
    assert_eq!(options.shutdown_timeout, Duration::from_millis(1500));
    assert_eq!(options.resume_flag.as_deref(), Some("--resume"));
}

#[test]
fn absent_variables_keep_defaults() {
    let defaults = EngineOptions::default();
    let options = EngineOptions::default().overlay_env(vars(&[])).unwrap();

    assert_eq!(options.executable, defaults.executable);
    assert_eq!(options.endpoint, defaults.endpoint);
    assert_eq!(options.buffer_capacity, defaults.buffer_capacity);
    assert_eq!(options.state_file, defaults.state_file);
}

#[test]
fn empty_state_file_disables_persistence() {
    let options = EngineOptions::default()
        .overlay_env(vars(&[("CLAUDE_DIRECTOR_STATE_FILE", "")]))
        .unwrap();
    assert!(options.state_file.is_none());
}

#[test]
fn invalid_numbers_are_config_errors() {
    for (key, value) in [
        ("CLAUDE_DIRECTOR_BUFFER_BYTES", "0"),
        ("CLAUDE_DIRECTOR_BUFFER_BYTES", "lots"),
        ("CLAUDE_DIRECTOR_SHUTDOWN_TIMEOUT_MS", "-5"),
    ] {
        let err = EngineOptions::default()
            .overlay_env(vars(&[(key, value)]))
            .unwrap_err();
        assert!(matches!(err, DirectorError::InvalidConfig(_)), "{key}={value}");
    }
}

#[test]
fn invalid_endpoint_is_a_config_error() {
    let err = EngineOptions::default()
        .overlay_env(vars(&[("CLAUDE_DIRECTOR_ENDPOINT", "tcp://not-an-address")]))
        .unwrap_err();
    assert!(matches!(err, DirectorError::InvalidConfig(_)));
}

#[test]
fn child_env_drops_blocked_variables() {
    let mut builder = EngineOptions::builder()
        .endpoint(ControlEndpoint::loopback(4000))
        .env("ANTHROPIC_LOG", "debug");
    for name in BLOCKED_ENV_VARS {
        builder = builder.env(*name, "/evil");
    }
    let options = builder.build();

    let env = options.child_env();

    for name in BLOCKED_ENV_VARS {
        assert!(!env.contains_key(*name), "{name} leaked");
    }
    assert_eq!(env.get("ANTHROPIC_LOG").map(String::as_str), Some("debug"));
    assert_eq!(env.get("TERM").map(String::as_str), Some("xterm-256color"));
    assert_eq!(
        env.get(ENDPOINT_ENV_VAR).map(String::as_str),
        Some("tcp://127.0.0.1:4000")
    );
}

#[test]
fn user_env_cannot_override_the_endpoint() {
    let options = EngineOptions::builder()
        .endpoint(ControlEndpoint::loopback(4000))
        .env(ENDPOINT_ENV_VAR, "tcp://127.0.0.1:1")
        .build();

    assert_eq!(
        options.child_env()[ENDPOINT_ENV_VAR],
        "tcp://127.0.0.1:4000"
    );
}

#[test]
fn endpoint_text_forms_parse() {
    assert_eq!(
        "tcp://127.0.0.1:9000".parse::<ControlEndpoint>().unwrap(),
        ControlEndpoint::loopback(9000)
    );
    #[cfg(unix)]
    {
        assert_eq!(
            "unix:///run/director.sock".parse::<ControlEndpoint>().unwrap(),
            ControlEndpoint::Unix(PathBuf::from("/run/director.sock"))
        );
        assert_eq!(
            "/run/director.sock".parse::<ControlEndpoint>().unwrap(),
            ControlEndpoint::Unix(PathBuf::from("/run/director.sock"))
        );
    }
    assert!("".parse::<ControlEndpoint>().is_err());
}
