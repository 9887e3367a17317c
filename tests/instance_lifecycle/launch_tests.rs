//! Launch behaviour: message exchange, idempotence, claims, ports and rollback.

use super::helpers::{
    LOOPBACK, StateDir, define_cat, define_text_tool, free_port_base, open_orchestrator, state_dir,
};
use chrono::Utc;
use rstest::rstest;
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use toolbridge::bridge::BridgeClient;
use toolbridge::envelope::{MessageEnvelope, SOURCE_INSTANCE_KEY, message_type};
use toolbridge::instance::adapters::FileInstanceRepository;
use toolbridge::instance::domain::{InstanceKey, RunningInstance};
use toolbridge::instance::ports::InstanceRepository;
use toolbridge::instance::services::{LaunchOutcome, LaunchRequest, OrchestratorError};
use toolbridge::tool_definition::domain::ToolName;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn echo_tool_returns_sent_content(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;

    let outcome = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    assert!(outcome.is_launched());
    let port = outcome.instance().port();

    let mut client = BridgeClient::connect(SocketAddr::new(LOOPBACK, port)).await?;
    client
        .send(&MessageEnvelope::new(message_type::USER, "hello", Utc::now()))
        .await?;
    let reply = client
        .receive(Duration::from_secs(5))
        .await?
        .ok_or_else(|| eyre::eyre!("no reply from echo tool"))?;

    assert_eq!(reply.content(), "hello");
    assert_eq!(reply.metadata().get(SOURCE_INSTANCE_KEY), Some(&json!("cat")));

    let key = InstanceKey::new("cat")?;
    let status = orchestrator
        .status(&key)
        .await?
        .ok_or_else(|| eyre::eyre!("instance should be known"))?;
    assert_eq!(status.metrics().messages_sent, 1);
    assert_eq!(status.metrics().messages_received, 1);

    orchestrator.terminate(&key).await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reply_reaches_client_that_closed_its_write_side(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    let outcome = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    let port = outcome.instance().port();

    let mut client = BridgeClient::connect(SocketAddr::new(LOOPBACK, port)).await?;
    client
        .send(&MessageEnvelope::new(message_type::USER, "hello", Utc::now()))
        .await?;
    client.finish().await?;
    let reply = client
        .receive(Duration::from_secs(3))
        .await?
        .ok_or_else(|| eyre::eyre!("no reply after closing the write side"))?;

    assert_eq!(reply.content(), "hello");
    orchestrator.terminate(&InstanceKey::new("cat")?).await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_launch_reports_running_instance(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;

    let first = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    let second = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;

    let LaunchOutcome::AlreadyRunning(existing) = second else {
        return Err(eyre::eyre!("expected the running instance to be reported"));
    };
    assert_eq!(existing.pid(), first.instance().pid());
    assert_eq!(existing.port(), first.instance().port());
    assert_eq!(orchestrator.list_running().await?.len(), 1);

    orchestrator.shutdown_all().await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn aliased_instances_get_distinct_ports_and_pids(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;

    for alias in ["a", "b"] {
        orchestrator
            .launch(LaunchRequest::new(ToolName::new("cat")?).with_alias(InstanceKey::new(alias)?))
            .await?;
    }

    let running = orchestrator.list_running().await?;
    let keys: Vec<&str> = running
        .iter()
        .map(|instance| instance.instance_key().as_str())
        .collect();
    assert_eq!(keys, ["a", "b"]);
    let ports: BTreeSet<u16> = running.iter().map(|instance| instance.port()).collect();
    let pids: BTreeSet<u32> = running.iter().map(|instance| instance.pid()).collect();
    assert_eq!(ports.len(), 2);
    assert_eq!(pids.len(), 2);

    assert_eq!(orchestrator.shutdown_all().await?, 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn session_is_recorded_on_descriptor(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;

    let outcome = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?).with_session("s-42"))
        .await?;
    assert_eq!(outcome.instance().session_id(), Some("s-42"));

    orchestrator.shutdown_all().await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn executable_removed_after_definition_fails_launch(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    let script = state_dir.path().join("vanishing-tool");
    fs::write(&script, "#!/bin/sh\nexec cat\n")?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
    define_text_tool(&orchestrator, "vanishing", script.as_str(), &[]).await?;
    fs::remove_file(&script)?;

    let result = orchestrator
        .launch(LaunchRequest::new(ToolName::new("vanishing")?))
        .await;

    assert!(matches!(result, Err(OrchestratorError::LaunchFailed { .. })));
    assert!(orchestrator.list_running().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn process_exiting_at_startup_releases_its_port(state_dir: StateDir) -> eyre::Result<()> {
    let base = free_port_base()?;
    let orchestrator = open_orchestrator(state_dir.path(), base)?;
    define_text_tool(&orchestrator, "quitter", "/bin/sh", &["-c", "exit 1"]).await?;

    let result = orchestrator
        .launch(LaunchRequest::new(ToolName::new("quitter")?))
        .await;

    assert!(matches!(result, Err(OrchestratorError::LaunchFailed { .. })));
    assert!(orchestrator.list_running().await?.is_empty());
    let key = InstanceKey::new("quitter")?;
    assert!(orchestrator.status(&key).await?.is_none());

    define_cat(&orchestrator, "cat").await?;
    let relaunch = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    assert!(relaunch.is_launched());
    orchestrator.shutdown_all().await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_tool_is_rejected(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;

    let result = orchestrator
        .launch(LaunchRequest::new(ToolName::new("nope")?))
        .await;

    assert!(matches!(result, Err(OrchestratorError::UnknownTool(_))));
    Ok(())
}

async fn claim_key(state_dir: &StateDir, key: &str, launcher_pid: u32) -> eyre::Result<bool> {
    let instances = FileInstanceRepository::open(&state_dir.path().join("instances"))?;
    let placeholder = RunningInstance::starting(
        InstanceKey::new(key)?,
        ToolName::new(key)?,
        launcher_pid,
        None,
        Utc::now(),
    );
    Ok(instances.claim(&placeholder).await?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn launch_waits_out_a_claim_held_by_a_live_launcher(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    assert!(claim_key(&state_dir, "cat", std::process::id()).await?);

    let result = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await;

    assert!(matches!(result, Err(OrchestratorError::LaunchInProgress(_))));
    let key = InstanceKey::new("cat")?;
    let held = orchestrator
        .status(&key)
        .await?
        .ok_or_else(|| eyre::eyre!("claim should still be visible"))?;
    assert!(held.is_starting());
    assert!(orchestrator.list_running().await?.is_empty());
    assert!(matches!(
        orchestrator.terminate(&key).await,
        Err(OrchestratorError::LaunchInProgress(_))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_left_by_a_dead_launcher_is_taken_over(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    let mut finished = std::process::Command::new("/bin/true").spawn()?;
    let dead_pid = finished.id();
    finished.wait()?;
    assert!(claim_key(&state_dir, "cat", dead_pid).await?);

    let outcome = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;

    assert!(outcome.is_launched());
    assert!(outcome.instance().is_running());
    orchestrator.shutdown_all().await?;
    Ok(())
}
