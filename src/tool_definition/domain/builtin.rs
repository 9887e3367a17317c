//! Compiled-in tool definitions.

use super::{
    AdapterKind, Capability, DefinedBy, HealthCheck, MessageFormat, PortSpec, ToolDefinition,
    ToolName,
};
use std::num::NonZeroU16;

struct BuiltinSpec {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    kind: AdapterKind,
    executable: &'static str,
    args: &'static [&'static str],
    port: u16,
    format: MessageFormat,
    capabilities: &'static [&'static str],
}

const BUILTINS: [BuiltinSpec; 2] = [
    BuiltinSpec {
        name: "claude-code",
        display_name: "Claude Code",
        description: "Anthropic's coding assistant in stream-json mode",
        kind: AdapterKind::InteractiveAssistant,
        executable: "claude",
        args: &[
            "--print",
            "--input-format",
            "stream-json",
            "--output-format",
            "stream-json",
            "--verbose",
        ],
        port: 8400,
        format: MessageFormat::Json,
        capabilities: &["code_generation", "code_analysis", "debugging", "refactoring"],
    },
    BuiltinSpec {
        name: "aider",
        display_name: "Aider",
        description: "Aider pair programmer driven line by line",
        kind: AdapterKind::GenericText,
        executable: "aider",
        args: &["--no-pretty", "--yes-always"],
        port: 8401,
        format: MessageFormat::Text,
        capabilities: &["code_generation", "refactoring"],
    },
];

/// Returns the compiled-in definitions, in catalog order.
#[must_use]
pub fn builtin_definitions() -> Vec<ToolDefinition> {
    BUILTINS.iter().filter_map(build).collect()
}

/// Returns `true` when `name` belongs to a compiled-in definition.
#[must_use]
pub fn is_builtin_name(name: &ToolName) -> bool {
    BUILTINS.iter().any(|spec| spec.name == name.as_str())
}

fn build(spec: &BuiltinSpec) -> Option<ToolDefinition> {
    let name = ToolName::new(spec.name).ok()?;
    let capabilities = spec
        .capabilities
        .iter()
        .filter_map(|flag| Capability::new(flag).ok());
    let definition = ToolDefinition::new(name, spec.kind, spec.executable)
        .ok()?
        .with_display_name(spec.display_name)
        .with_description(spec.description)
        .with_launch_args(spec.args.iter().copied())
        .with_port(PortSpec::Fixed(NonZeroU16::new(spec.port)?))
        .with_capabilities(capabilities)
        .with_input_format(spec.format)
        .with_output_format(spec.format)
        .with_health_check(HealthCheck::Process)
        .with_defined_by(DefinedBy::Builtin);
    Some(definition)
}
