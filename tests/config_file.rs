// tests/config_file.rs

//! Queue definition file loading and validation.

use std::io::Write;
use std::time::Duration;

use runqueue::config::load_and_validate;
use runqueue::errors::QueueError;
use runqueue::queue::QueuePriority;

fn write_definition(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn full_definition_round_trips_into_engine_types() {
    let file = write_definition(
        r#"
[queue]
id = "deploy"
max_concurrent = 2
stop_on_error = true
timeout_secs = 600
priority = "high"

[queue.retry]
max_retries = 5
retry_delay_ms = 250
backoff_multiplier = 1.5

[command.build]
run = "cargo build --release"
estimated_duration_secs = 120

[command.upload]
run = "scp target/release/app host:/srv"
depends_on = ["build"]

[command.restart]
run = "ssh host systemctl restart app"
depends_on = ["upload"]
payload = { service = "app" }
"#,
    );

    let definition = load_and_validate(file.path()).unwrap();
    assert_eq!(definition.queue_id(), Some("deploy"));

    let options = definition.options();
    assert_eq!(options.max_concurrent, 2);
    assert!(options.stop_on_error);
    assert_eq!(options.timeout, Some(Duration::from_secs(600)));
    assert_eq!(options.priority, QueuePriority::High);
    assert_eq!(options.retry_policy.max_retries, 5);
    assert_eq!(options.retry_policy.retry_delay, Duration::from_millis(250));
    assert_eq!(options.retry_policy.backoff_multiplier, 1.5);

    let commands = definition.to_commands();
    assert_eq!(commands.len(), 3);

    let build = commands.iter().find(|c| c.identity() == "build").unwrap();
    assert_eq!(build.action, "cargo build --release");
    assert_eq!(build.estimated_duration, Some(Duration::from_secs(120)));

    let restart = commands.iter().find(|c| c.identity() == "restart").unwrap();
    assert_eq!(restart.depends_on, vec!["upload"]);
    assert_eq!(
        restart
            .payload
            .as_ref()
            .and_then(|p| p.get("service"))
            .and_then(|v| v.as_str()),
        Some("app")
    );
}

#[test]
fn defaults_apply_when_queue_section_is_omitted() {
    let file = write_definition(
        r#"
[command.only]
run = "echo hi"
"#,
    );

    let definition = load_and_validate(file.path()).unwrap();
    assert_eq!(definition.queue_id(), None);

    let options = definition.options();
    assert_eq!(options.max_concurrent, 4);
    assert!(!options.stop_on_error);
    assert_eq!(options.timeout, None);
    assert_eq!(options.priority, QueuePriority::Normal);
    assert_eq!(options.retry_policy.max_retries, 3);
}

#[test]
fn empty_definition_is_rejected() {
    let file = write_definition("[queue]\nid = \"empty\"\n");

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, QueueError::ConfigError(_)));
}

#[test]
fn unknown_dependency_reference_is_rejected() {
    let file = write_definition(
        r#"
[command.a]
run = "echo a"
depends_on = ["missing"]
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        QueueError::ConfigError(msg) => {
            assert!(msg.contains("unknown dependency"), "message: {msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn invalid_priority_is_rejected() {
    let file = write_definition(
        r#"
[queue]
priority = "urgent"

[command.a]
run = "echo a"
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, QueueError::ConfigError(_)));
}

#[test]
fn self_dependency_is_allowed_and_runs_via_fallback() {
    let file = write_definition(
        r#"
[command.a]
run = "echo a"
depends_on = ["a"]
"#,
    );

    // A 1-cycle is not a definition error; the planner handles it.
    let definition = load_and_validate(file.path()).unwrap();
    let commands = definition.to_commands();

    let graph = runqueue::graph::DependencyGraph::build(&commands).unwrap();
    let plan = runqueue::plan::plan(&graph);
    assert_eq!(plan.groups.len(), 1);
    assert_eq!(plan.total_commands, 1);
}
