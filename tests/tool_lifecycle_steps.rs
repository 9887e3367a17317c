//! Behaviour tests for defining, launching and stopping tool instances.

#![cfg(unix)]

#[path = "instance_lifecycle/helpers.rs"]
mod helpers;

use chrono::Utc;
use eyre::{WrapErr, eyre};
use helpers::{LOOPBACK, StateDir, TestOrchestrator, define_cat, free_port_base, open_orchestrator};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::net::SocketAddr;
use std::process::{Command, Output};
use std::time::Duration;
use toolbridge::bridge::BridgeClient;
use toolbridge::envelope::{MessageEnvelope, message_type};
use toolbridge::instance::domain::{InstanceKey, InstanceStatus, RunningInstance};
use toolbridge::instance::services::{LaunchRequest, TerminateOutcome};
use toolbridge::process::{StopSignal, send_signal};
use toolbridge::tool_definition::domain::ToolName;
use toolbridge::tool_definition::services::ToolDefinitionStoreError;

struct LifecycleWorld {
    state: StateDir,
    orchestrator: TestOrchestrator,
    launched: Option<RunningInstance>,
    client: Option<BridgeClient>,
    last_store_error: Option<ToolDefinitionStoreError>,
    last_terminate: Option<TerminateOutcome>,
    last_command: Option<Output>,
}

impl LifecycleWorld {
    fn new() -> eyre::Result<Self> {
        let state = helpers::state_dir();
        let orchestrator = open_orchestrator(state.path(), free_port_base()?)?;
        Ok(Self {
            state,
            orchestrator,
            launched: None,
            client: None,
            last_store_error: None,
            last_terminate: None,
            last_command: None,
        })
    }

    fn launched(&self) -> eyre::Result<&RunningInstance> {
        self.launched
            .as_ref()
            .ok_or_else(|| eyre!("an instance should have been launched"))
    }
}

impl Drop for LifecycleWorld {
    fn drop(&mut self) {
        if self.launched.is_some() {
            run_async(self.orchestrator.shutdown_all()).ok();
        }
    }
}

#[fixture]
fn world() -> LifecycleWorld {
    LifecycleWorld::new().expect("lifecycle world should open")
}

fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

#[given(r#"a text tool "{name}" running "/bin/cat""#)]
fn text_tool_running_cat(world: &mut LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    run_async(define_cat(&world.orchestrator, &name)).wrap_err("definition should register")?;
    Ok(())
}

#[when(r#"instance "{name}" is launched"#)]
fn launch_instance(world: &mut LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let outcome = run_async(world.orchestrator.launch(LaunchRequest::new(ToolName::new(&name)?)))
        .wrap_err("launch should succeed")?;
    world.launched = Some(outcome.instance().clone());
    Ok(())
}

#[when(r#"the client sends "{content}" to instance "{name}""#)]
fn client_sends(
    world: &mut LifecycleWorld,
    content: String,
    name: String,
) -> Result<(), eyre::Report> {
    let instance = world.launched()?;
    if instance.instance_key().as_str() != name {
        return Err(eyre!("instance '{name}' was not the one launched"));
    }
    let address = SocketAddr::new(LOOPBACK, instance.port());
    let mut client = run_async(BridgeClient::connect(address)).wrap_err("client should connect")?;
    run_async(client.send(&MessageEnvelope::new(message_type::USER, content, Utc::now())))
        .wrap_err("send should succeed")?;
    world.client = Some(client);
    Ok(())
}

#[when("the instance process is killed")]
fn kill_instance_process(world: &mut LifecycleWorld) -> Result<(), eyre::Report> {
    let pid = world.launched()?.pid();
    if !send_signal(pid, StopSignal::Kill)? {
        return Err(eyre!("process {pid} was already gone"));
    }
    Ok(())
}

#[when(r#"the tool "{name}" is undefined"#)]
fn undefine_tool(world: &mut LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let result = run_async(world.orchestrator.definitions().unregister(&ToolName::new(&name)?));
    world.last_store_error = result.err();
    Ok(())
}

#[when(r#"instance "{name}" is terminated"#)]
fn terminate_instance(world: &mut LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let outcome = run_async(world.orchestrator.terminate(&InstanceKey::new(&name)?))
        .wrap_err("terminate should not fail")?;
    world.last_terminate = Some(outcome);
    Ok(())
}

#[when(r#"the command line terminates "{name}""#)]
fn command_line_terminates(world: &mut LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let binary = option_env!("CARGO_BIN_EXE_toolbridge")
        .ok_or_else(|| eyre!("CARGO_BIN_EXE_toolbridge is not set"))?;
    let config = world.state.path().join("cli.toml");
    std::fs::write(&config, "[logging]\nlevel = \"warn\"\n")?;
    let output = Command::new(binary)
        .env_remove("TOOLBRIDGE_CONFIG")
        .env_remove("TOOLBRIDGE_PORT_BASE")
        .env("TOOLBRIDGE_STATE_DIR", world.state.path().as_str())
        .args(["--config", config.as_str(), "tools", "terminate", &name])
        .output()
        .wrap_err("toolbridge should run")?;
    world.last_command = Some(output);
    Ok(())
}

#[then(r#"the client receives "{content}""#)]
fn client_receives(world: &mut LifecycleWorld, content: String) -> Result<(), eyre::Report> {
    let client = world
        .client
        .as_mut()
        .ok_or_else(|| eyre!("client should be connected"))?;
    let reply = run_async(client.receive(Duration::from_secs(5)))?
        .ok_or_else(|| eyre!("no reply within five seconds"))?;
    if reply.content() != content {
        return Err(eyre!("expected '{content}', got '{}'", reply.content()));
    }
    Ok(())
}

#[then("the removal is rejected as built-in")]
fn removal_rejected(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    if !matches!(
        world.last_store_error,
        Some(ToolDefinitionStoreError::BuiltinImmutable(_))
    ) {
        return Err(eyre!("expected built-in rejection, got {:?}", world.last_store_error));
    }
    Ok(())
}

#[then(r#"tool "{name}" is still listed"#)]
fn tool_still_listed(world: &LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let definitions = run_async(world.orchestrator.definitions().list())?;
    if !definitions
        .iter()
        .any(|definition| definition.name().as_str() == name)
    {
        return Err(eyre!("tool '{name}' missing from the catalog"));
    }
    Ok(())
}

#[then(r#"instance "{name}" is reported stopped"#)]
fn reported_stopped(world: &mut LifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let key = InstanceKey::new(&name)?;
    let status = run_async(helpers::wait_until_stopped(
        &world.orchestrator,
        &key,
        Duration::from_secs(5),
    ))?;
    let stopped = status.ok_or_else(|| eyre!("first status query should report the exit"))?;
    if stopped.status() != InstanceStatus::Stopped {
        return Err(eyre!("expected stopped, got {}", stopped.status()));
    }
    world.launched = None;
    Ok(())
}

#[then("termination reports not running")]
fn termination_not_running(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    if world.last_terminate != Some(TerminateOutcome::NotRunning) {
        return Err(eyre!("expected not running, got {:?}", world.last_terminate));
    }
    Ok(())
}

#[then(r#"the command succeeds and reports "{text}""#)]
fn command_succeeds_with(world: &LifecycleWorld, text: String) -> Result<(), eyre::Report> {
    let output = world
        .last_command
        .as_ref()
        .ok_or_else(|| eyre!("a command should have run"))?;
    if !output.status.success() {
        return Err(eyre!(
            "command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains(&text) {
        return Err(eyre!("expected '{text}' in: {stdout}"));
    }
    Ok(())
}

#[scenario(
    path = "tests/features/tool_lifecycle.feature",
    name = "Echo tool answers over its socket"
)]
#[tokio::test(flavor = "multi_thread")]
async fn echo_tool_answers(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/tool_lifecycle.feature",
    name = "Built-in definitions cannot be removed"
)]
#[tokio::test(flavor = "multi_thread")]
async fn builtins_cannot_be_removed(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/tool_lifecycle.feature",
    name = "Killed instance is reported stopped"
)]
#[tokio::test(flavor = "multi_thread")]
async fn killed_instance_reported_stopped(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/tool_lifecycle.feature",
    name = "Terminating an idle name reports not running"
)]
#[tokio::test(flavor = "multi_thread")]
async fn idle_name_not_running(world: LifecycleWorld) {
    let _ = world;
}
