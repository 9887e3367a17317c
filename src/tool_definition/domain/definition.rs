//! The tool definition aggregate.

use super::{AdapterKind, Capability, HealthCheck, MessageFormat, PortSpec, ToolDefinitionDomainError, ToolName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Origin of a tool definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinedBy {
    /// Compiled into the binary; immutable.
    Builtin,
    /// Created with `tools define`.
    User,
}

impl DefinedBy {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for DefinedBy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Everything needed to launch and talk to one kind of tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    name: ToolName,
    display_name: String,
    adapter_kind: AdapterKind,
    executable_path: String,
    #[serde(default)]
    launch_args: Vec<String>,
    port: PortSpec,
    #[serde(default)]
    capabilities: BTreeSet<Capability>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    input_format: MessageFormat,
    output_format: MessageFormat,
    #[serde(default)]
    health_check: HealthCheck,
    defined_by: DefinedBy,
    #[serde(default)]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl ToolDefinition {
    /// Creates a user definition with defaults for every optional field.
    ///
    /// Defaults: title-cased display name, no arguments, `auto` port, the
    /// adapter kind's message format in both directions and a `process`
    /// health check.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionDomainError::EmptyExecutable`] when
    /// `executable_path` is blank.
    pub fn new(
        name: ToolName,
        adapter_kind: AdapterKind,
        executable_path: impl Into<String>,
    ) -> Result<Self, ToolDefinitionDomainError> {
        let executable = executable_path.into().trim().to_owned();
        if executable.is_empty() {
            return Err(ToolDefinitionDomainError::EmptyExecutable);
        }
        Ok(Self {
            display_name: name.default_display_name(),
            description: format!("User-defined {name} tool"),
            name,
            adapter_kind,
            executable_path: executable,
            launch_args: Vec::new(),
            port: PortSpec::Auto,
            capabilities: BTreeSet::new(),
            environment: BTreeMap::new(),
            input_format: adapter_kind.default_format(),
            output_format: adapter_kind.default_format(),
            health_check: HealthCheck::Process,
            defined_by: DefinedBy::User,
            created_at: None,
        })
    }

    /// Sets the display name; blank input keeps the default.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let label = display_name.into();
        if !label.trim().is_empty() {
            self.display_name = label.trim().to_owned();
        }
        self
    }

    /// Sets the description; blank input keeps the default.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let text = description.into();
        if !text.trim().is_empty() {
            self.description = text.trim().to_owned();
        }
        self
    }

    /// Sets the ordered launch arguments.
    #[must_use]
    pub fn with_launch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launch_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the port policy.
    #[must_use]
    pub const fn with_port(mut self, port: PortSpec) -> Self {
        self.port = port;
        self
    }

    /// Sets the capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Adds environment overrides applied on top of the parent environment.
    #[must_use]
    pub fn with_environment<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(variables.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Sets the format written to the tool's stdin.
    #[must_use]
    pub const fn with_input_format(mut self, format: MessageFormat) -> Self {
        self.input_format = format;
        self
    }

    /// Sets the format expected on the tool's stdout.
    #[must_use]
    pub const fn with_output_format(mut self, format: MessageFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Sets the readiness policy.
    #[must_use]
    pub fn with_health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = health_check;
        self
    }

    /// Records when the definition was created.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub(crate) const fn with_defined_by(mut self, defined_by: DefinedBy) -> Self {
        self.defined_by = defined_by;
        self
    }

    /// Returns the unique name.
    #[must_use]
    pub const fn name(&self) -> &ToolName {
        &self.name
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the adapter strategy.
    #[must_use]
    pub const fn adapter_kind(&self) -> AdapterKind {
        self.adapter_kind
    }

    /// Returns the configured executable (a path or a bare command name).
    #[must_use]
    pub fn executable_path(&self) -> &str {
        &self.executable_path
    }

    /// Returns the launch arguments in order.
    #[must_use]
    pub fn launch_args(&self) -> &[String] {
        &self.launch_args
    }

    /// Returns the port policy.
    #[must_use]
    pub const fn port(&self) -> PortSpec {
        self.port
    }

    /// Returns the capability flags.
    #[must_use]
    pub const fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Returns the environment overrides.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Returns the stdin format.
    #[must_use]
    pub const fn input_format(&self) -> MessageFormat {
        self.input_format
    }

    /// Returns the stdout format.
    #[must_use]
    pub const fn output_format(&self) -> MessageFormat {
        self.output_format
    }

    /// Returns the readiness policy.
    #[must_use]
    pub const fn health_check(&self) -> &HealthCheck {
        &self.health_check
    }

    /// Returns the definition's origin.
    #[must_use]
    pub const fn defined_by(&self) -> DefinedBy {
        self.defined_by
    }

    /// Returns `true` for compiled-in definitions.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.defined_by == DefinedBy::Builtin
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the creation time of a user definition.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Parses one `KEY=VALUE` environment assignment.
///
/// # Errors
///
/// Returns [`ToolDefinitionDomainError::InvalidEnvironment`] when the key is
/// missing or contains whitespace or `=`.
pub fn parse_environment_assignment(
    assignment: &str,
) -> Result<(String, String), ToolDefinitionDomainError> {
    let invalid = || ToolDefinitionDomainError::InvalidEnvironment(assignment.to_owned());
    let (raw_key, value) = assignment.split_once('=').ok_or_else(invalid)?;
    let key = raw_key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok((key.to_owned(), value.to_owned()))
}
