//! Handlers for the `tools` subcommands.

use super::app::App;
use super::args::{DefineArgs, SendArgs, ToolsCommand};
use super::{CliError, host, render};
use crate::bridge::{BridgeClient, BridgeError};
use crate::envelope::MessageEnvelope;
use crate::instance::domain::{InstanceKey, RunningInstance};
use crate::instance::services::TerminateOutcome;
use crate::tool_definition::domain::{
    Capability, ToolDefinition, ToolName, parse_environment_assignment,
};
use camino::Utf8Path;
use chrono::Utc;
use std::io::Write;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Runs one subcommand other than `host`.
pub(super) async fn execute<W: Write>(
    app: &App,
    config: Option<&Utf8Path>,
    action: ToolsCommand,
    out: &mut W,
) -> Result<(), CliError> {
    match action {
        ToolsCommand::List => {
            let definitions = app.store().list().await?;
            render::definitions(out, &definitions)?;
        }
        ToolsCommand::Define(args) => define(app, args, out).await?,
        ToolsCommand::Undefine { name } => {
            let removed = app.store().unregister(&ToolName::new(&name)?).await?;
            writeln!(out, "Undefined tool '{}'", removed.name())?;
        }
        ToolsCommand::Defined { name } => defined(app, name.as_deref(), out).await?,
        ToolsCommand::Create { instance, tool } => create(app, &instance, &tool, out).await?,
        ToolsCommand::Launch(args) if args.foreground => {
            host::launch_foreground(app, &args, out).await?;
        }
        ToolsCommand::Launch(args) => host::launch_detached(app, config, &args, out).await?,
        ToolsCommand::Terminate { name } => terminate(app, &name, out).await?,
        ToolsCommand::Status { name: Some(name) } => {
            let key = InstanceKey::new(&name)?;
            let instance = app
                .orchestrator()
                .status(&key)
                .await?
                .ok_or_else(|| CliError::NotRunning(key.to_string()))?;
            render::instance_detail(out, &instance, Utc::now())?;
        }
        ToolsCommand::Status { name: None } | ToolsCommand::Instances => {
            let instances = app.orchestrator().list_running().await?;
            render::instances(out, &instances, Utc::now())?;
        }
        ToolsCommand::Capabilities { name } => {
            let tool = ToolName::new(&name)?;
            let definition = app
                .store()
                .get(&tool)
                .await?
                .ok_or_else(|| CliError::NotDefined(tool.to_string()))?;
            render::capabilities(out, &definition)?;
        }
        ToolsCommand::Send(args) => send(app, args, out).await?,
        ToolsCommand::Host(_) => {
            return Err(CliError::Host(
                "host mode must be started on its own".to_owned(),
            ));
        }
    }
    Ok(())
}

async fn define<W: Write>(app: &App, args: DefineArgs, out: &mut W) -> Result<(), CliError> {
    let capabilities = args
        .capabilities
        .iter()
        .filter(|raw| !raw.trim().is_empty())
        .map(Capability::new)
        .collect::<Result<Vec<_>, _>>()?;
    let environment = args
        .environment
        .iter()
        .map(|assignment| parse_environment_assignment(assignment))
        .collect::<Result<Vec<_>, _>>()?;

    let mut definition = ToolDefinition::new(ToolName::new(&args.name)?, args.kind, args.executable)?
        .with_port(args.port)
        .with_capabilities(capabilities)
        .with_environment(environment)
        .with_health_check(args.health_check);
    if let Some(launch_args) = &args.launch_args {
        definition = definition.with_launch_args(launch_args.split_whitespace());
    }
    if let Some(display_name) = args.display_name {
        definition = definition.with_display_name(display_name);
    }
    if let Some(description) = args.description {
        definition = definition.with_description(description);
    }
    if let Some(format) = args.input_format {
        definition = definition.with_input_format(format);
    }
    if let Some(format) = args.output_format {
        definition = definition.with_output_format(format);
    }

    let stored = app.store().register(definition).await?;
    writeln!(
        out,
        "Defined tool '{}' ({}, port {})",
        stored.name(),
        stored.adapter_kind(),
        stored.port()
    )?;
    Ok(())
}

async fn defined<W: Write>(app: &App, name: Option<&str>, out: &mut W) -> Result<(), CliError> {
    let Some(raw) = name else {
        let definitions = app.store().list_user().await?;
        if definitions.is_empty() {
            writeln!(out, "No user-defined tools")?;
        } else {
            render::definitions(out, &definitions)?;
        }
        return Ok(());
    };
    let tool = ToolName::new(raw)?;
    let definition = app
        .store()
        .get(&tool)
        .await?
        .ok_or_else(|| CliError::NotDefined(tool.to_string()))?;
    render::definition_detail(out, &definition)?;
    Ok(())
}

/// Checks an alias and its tool, then prints the launch command for it.
async fn create<W: Write>(
    app: &App,
    instance: &str,
    tool: &str,
    out: &mut W,
) -> Result<(), CliError> {
    let alias = InstanceKey::new(instance)?;
    let name = ToolName::new(tool)?;
    if app.store().get(&name).await?.is_none() {
        return Err(CliError::NotDefined(name.to_string()));
    }
    writeln!(out, "Instance '{alias}' of tool '{name}' is ready to launch")?;
    writeln!(out, "Launch with: toolbridge tools launch {name} --instance {alias}")?;
    Ok(())
}

async fn terminate<W: Write>(app: &App, name: &str, out: &mut W) -> Result<(), CliError> {
    let key = InstanceKey::new(name)?;
    match app.orchestrator().terminate(&key).await? {
        TerminateOutcome::Terminated(instance) => {
            writeln!(
                out,
                "Terminated instance '{}' (pid {}, port {})",
                instance.instance_key(),
                instance.pid(),
                instance.port()
            )?;
            Ok(())
        }
        TerminateOutcome::NotRunning => {
            writeln!(out, "No running instance named '{key}'")?;
            let running = app.orchestrator().list_running().await?;
            render::instances(out, &running, Utc::now())?;
            Ok(())
        }
    }
}

/// Sends one envelope and prints replies as JSON lines until `wait_ms`
/// passes or the bridge closes the connection.
async fn send<W: Write>(app: &App, args: SendArgs, out: &mut W) -> Result<(), CliError> {
    let key = InstanceKey::new(&args.name)?;
    let instance = app
        .orchestrator()
        .status(&key)
        .await?
        .filter(RunningInstance::is_running)
        .ok_or_else(|| CliError::NotRunning(key.to_string()))?;

    let address = SocketAddr::new(app.settings().ports.bind_address, instance.port());
    let mut client = BridgeClient::connect(address).await?;
    let envelope = MessageEnvelope::new(args.message_type, args.content, Utc::now());
    client.send(&envelope).await?;

    let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
    let mut replies = 0_usize;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match client.receive(remaining).await {
            Ok(Some(reply)) => {
                let line = reply.to_json_line().map_err(BridgeError::from)?;
                writeln!(out, "{line}")?;
                out.flush()?;
                replies = replies.saturating_add(1);
            }
            Ok(None) | Err(BridgeError::Disconnected) => break,
            Err(err) => return Err(err.into()),
        }
    }
    if replies == 0 {
        writeln!(out, "No reply within {} ms", args.wait_ms)?;
    }
    Ok(())
}
