//! Status queries across processes and after out-of-band exits.

use super::helpers::{
    StateDir, define_cat, free_port_base, open_orchestrator, state_dir, wait_until_stopped,
};
use rstest::rstest;
use std::time::Duration;
use toolbridge::instance::domain::{InstanceKey, InstanceStatus};
use toolbridge::instance::services::LaunchRequest;
use toolbridge::process::{StopSignal, send_signal};
use toolbridge::tool_definition::domain::ToolName;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn killed_process_is_reported_stopped(state_dir: StateDir) -> eyre::Result<()> {
    let orchestrator = open_orchestrator(state_dir.path(), free_port_base()?)?;
    define_cat(&orchestrator, "cat").await?;
    let launched = orchestrator
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    let key = InstanceKey::new("cat")?;

    assert!(send_signal(launched.instance().pid(), StopSignal::Kill)?);
    let status = wait_until_stopped(&orchestrator, &key, Duration::from_secs(5)).await?;

    let stopped = status.ok_or_else(|| eyre::eyre!("first query should report the stop"))?;
    assert_eq!(stopped.status(), InstanceStatus::Stopped);
    assert!(orchestrator.status(&key).await?.is_none());
    assert!(orchestrator.list_running().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_orchestrator_sees_persisted_instance(state_dir: StateDir) -> eyre::Result<()> {
    let base = free_port_base()?;
    let owner = open_orchestrator(state_dir.path(), base)?;
    let observer = open_orchestrator(state_dir.path(), base)?;
    define_cat(&owner, "cat").await?;
    let launched = owner
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;
    let key = InstanceKey::new("cat")?;

    let seen = observer
        .status(&key)
        .await?
        .ok_or_else(|| eyre::eyre!("descriptor should be visible"))?;
    assert!(seen.is_running());
    assert_eq!(seen.pid(), launched.instance().pid());
    assert_eq!(observer.list_running().await?.len(), 1);

    owner.terminate(&key).await?;
    assert!(observer.status(&key).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn flushed_metrics_reach_other_readers(state_dir: StateDir) -> eyre::Result<()> {
    let base = free_port_base()?;
    let owner = open_orchestrator(state_dir.path(), base)?;
    let observer = open_orchestrator(state_dir.path(), base)?;
    define_cat(&owner, "cat").await?;
    owner
        .launch(LaunchRequest::new(ToolName::new("cat")?))
        .await?;

    assert_eq!(owner.flush_metrics().await?, 1);
    let seen = observer
        .status(&InstanceKey::new("cat")?)
        .await?
        .ok_or_else(|| eyre::eyre!("descriptor should be visible"))?;
    assert_eq!(seen.metrics().messages_sent, 0);

    owner.shutdown_all().await?;
    Ok(())
}
