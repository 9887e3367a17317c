//! Command-line arguments.

use crate::tool_definition::domain::{AdapterKind, HealthCheck, MessageFormat, PortSpec};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Launch and drive stdio tools as socket services.
#[derive(Debug, Parser)]
#[command(name = "toolbridge", version, about)]
pub struct Cli {
    /// Configuration file (default: search `TOOLBRIDGE_CONFIG`,
    /// `./toolbridge.toml`, then the user config directory).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level command groups.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage tool definitions and running instances.
    Tools {
        /// Tool command.
        #[command(subcommand)]
        action: ToolsCommand,
    },
}

/// `tools` subcommands.
#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// List built-in and user-defined tools.
    List,
    /// Define a new tool.
    Define(DefineArgs),
    /// Remove a user-defined tool.
    Undefine {
        /// Tool name.
        name: String,
    },
    /// List user-defined tools, or show one definition in detail.
    Defined {
        /// Tool name.
        name: Option<String>,
    },
    /// Name an instance of a tool and print how to launch it.
    Create {
        /// Instance alias.
        instance: String,
        /// Tool the instance runs.
        #[arg(long = "type", value_name = "TOOL")]
        tool: String,
    },
    /// Launch a tool instance.
    Launch(LaunchArgs),
    /// Terminate a running instance.
    Terminate {
        /// Instance key (tool name or alias).
        name: String,
    },
    /// Show one instance, or every running instance.
    Status {
        /// Instance key (tool name or alias).
        name: Option<String>,
    },
    /// List running instances.
    Instances,
    /// Show a tool's capability flags.
    Capabilities {
        /// Tool name.
        name: String,
    },
    /// Send one message to a running instance and print its replies.
    Send(SendArgs),
    /// Host one instance in this process (used by `launch`).
    #[command(hide = true)]
    Host(HostArgs),
}

/// Arguments of `tools define`.
#[derive(Debug, Args)]
pub struct DefineArgs {
    /// Tool name: lowercase letters, digits, `-` or `_`.
    pub name: String,
    /// Adapter kind: `generic_json`, `generic_text` or
    /// `interactive_assistant`.
    #[arg(long = "type", value_name = "KIND")]
    pub kind: AdapterKind,
    /// Executable path or a name found on `PATH`.
    #[arg(long)]
    pub executable: String,
    /// Port: a number or `auto`.
    #[arg(long, default_value = "auto")]
    pub port: PortSpec,
    /// Comma-separated capability flags.
    #[arg(long, value_delimiter = ',')]
    pub capabilities: Vec<String>,
    /// Launch arguments, split on whitespace.
    #[arg(long, allow_hyphen_values = true)]
    pub launch_args: Option<String>,
    /// Health check: `none`, `process` or `command:<shell command>`.
    #[arg(long, default_value = "process")]
    pub health_check: HealthCheck,
    /// Environment override `KEY=VALUE`; repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub environment: Vec<String>,
    /// Human-readable name.
    #[arg(long)]
    pub display_name: Option<String>,
    /// Free-form description.
    #[arg(long)]
    pub description: Option<String>,
    /// Format written to the tool's stdin.
    #[arg(long)]
    pub input_format: Option<MessageFormat>,
    /// Format read from the tool's stdout.
    #[arg(long)]
    pub output_format: Option<MessageFormat>,
}

/// Arguments of `tools launch`.
#[derive(Debug, Args)]
pub struct LaunchArgs {
    /// Tool name.
    pub name: String,
    /// Session identifier passed to the tool.
    #[arg(long)]
    pub session: Option<String>,
    /// Instance alias, for running several instances of one tool.
    #[arg(long = "instance", value_name = "ALIAS")]
    pub alias: Option<String>,
    /// Stay attached and host the instance in this process until
    /// interrupted.
    #[arg(long)]
    pub foreground: bool,
}

/// Arguments of `tools send`.
#[derive(Debug, Args)]
pub struct SendArgs {
    /// Instance key (tool name or alias).
    pub name: String,
    /// Message content.
    pub content: String,
    /// Envelope type.
    #[arg(long = "type", default_value = "user")]
    pub message_type: String,
    /// How long to wait for replies, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub wait_ms: u64,
}

/// Arguments of the hidden `tools host` command.
#[derive(Debug, Args)]
pub struct HostArgs {
    /// Tool name.
    pub name: String,
    /// Session identifier passed to the tool.
    #[arg(long)]
    pub session: Option<String>,
    /// Instance alias.
    #[arg(long = "instance", value_name = "ALIAS")]
    pub alias: Option<String>,
}
