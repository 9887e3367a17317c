//! Termination and release of instance resources.

use super::helpers::{LOOPBACK, StateDir, define_cat, free_port_base, open_orchestrator, state_dir};
use rstest::rstest;
use std::net::TcpListener;
use toolbridge::instance::domain::InstanceKey;
use toolbridge::instance::services::{LaunchRequest, TerminateOutcome};
use toolbridge::process::pid_is_alive;
use toolbridge::tool_definition::domain::ToolName;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminate_frees_pid_and_port(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    let launched = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    let pid = launched.instance().pid();
    let port = launched.instance().port();

    let key = InstanceKey::new("cat")?;
    let outcome = orchestrator.terminate(&key).await?;

    let TerminateOutcome::Terminated(stopped) = outcome else {
        return Err(eyre::eyre!("expected the instance to be terminated"));
    };
    assert_eq!(stopped.pid(), pid);
    assert!(!stopped.is_running());
    assert!(!pid_is_alive(pid));
    assert!(TcpListener::bind((LOOPBACK, port)).is_ok());
    assert!(orchestrator.status(&key).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminating_unknown_key_reports_not_running(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;

    let outcome = orchestrator.terminate(&InstanceKey::new("idle")?).await?;

    assert_eq!(outcome, TerminateOutcome::NotRunning);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_terminate_reports_not_running(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    let key = InstanceKey::new("cat")?;

    orchestrator.terminate(&key).await?;
    let again = orchestrator.terminate(&key).await?;

    assert_eq!(again, TerminateOutcome::NotRunning);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminated_tool_can_be_relaunched(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    let key = InstanceKey::new("cat")?;

    let first = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    orchestrator.terminate(&key).await?;
    let second = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;

    assert!(second.is_launched());
    assert_ne!(second.instance().pid(), first.instance().pid());
    orchestrator.terminate(&key).await?;
    Ok(())
}
