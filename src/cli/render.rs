//! Plain-text rendering of command results.

use crate::instance::domain::RunningInstance;
use crate::tool_definition::domain::ToolDefinition;
use chrono::{DateTime, Utc};
use std::io::{self, Write};

/// Writes rows as left-aligned columns separated by two spaces.
fn table<W: Write>(out: &mut W, header: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = header.iter().map(|title| title.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_cells: Vec<String> = header.iter().map(|title| (*title).to_owned()).collect();
    for row in std::iter::once(&header_cells).chain(rows) {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(&widths) {
            if !line.is_empty() {
                line.push_str("  ");
            }
            line.push_str(&format!("{cell:<width$}"));
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

pub(super) fn definitions<W: Write>(out: &mut W, definitions: &[ToolDefinition]) -> io::Result<()> {
    let rows: Vec<Vec<String>> = definitions
        .iter()
        .map(|definition| {
            vec![
                definition.name().to_string(),
                definition.adapter_kind().to_string(),
                definition.port().to_string(),
                definition.defined_by().to_string(),
                definition.description().to_owned(),
            ]
        })
        .collect();
    table(out, &["NAME", "TYPE", "PORT", "SOURCE", "DESCRIPTION"], &rows)
}

pub(super) fn definition_detail<W: Write>(out: &mut W, definition: &ToolDefinition) -> io::Result<()> {
    writeln!(out, "name:          {}", definition.name())?;
    writeln!(out, "display name:  {}", definition.display_name())?;
    writeln!(out, "type:          {}", definition.adapter_kind())?;
    writeln!(out, "executable:    {}", definition.executable_path())?;
    writeln!(out, "launch args:   {}", definition.launch_args().join(" "))?;
    writeln!(out, "port:          {}", definition.port())?;
    writeln!(out, "input format:  {}", definition.input_format())?;
    writeln!(out, "output format: {}", definition.output_format())?;
    writeln!(out, "health check:  {}", definition.health_check())?;
    writeln!(out, "capabilities:  {}", capability_list(definition))?;
    for (key, value) in definition.environment() {
        writeln!(out, "env:           {key}={value}")?;
    }
    writeln!(out, "source:        {}", definition.defined_by())?;
    if let Some(created_at) = definition.created_at() {
        writeln!(out, "created:       {}", created_at.to_rfc3339())?;
    }
    writeln!(out, "description:   {}", definition.description())
}

pub(super) fn capabilities<W: Write>(out: &mut W, definition: &ToolDefinition) -> io::Result<()> {
    if definition.capabilities().is_empty() {
        return writeln!(out, "{} declares no capabilities", definition.name());
    }
    for capability in definition.capabilities() {
        writeln!(out, "{capability}\t{}", capability.label())?;
    }
    Ok(())
}

pub(super) fn instances<W: Write>(
    out: &mut W,
    instances: &[RunningInstance],
    now: DateTime<Utc>,
) -> io::Result<()> {
    if instances.is_empty() {
        return writeln!(out, "No running instances");
    }
    let rows: Vec<Vec<String>> = instances
        .iter()
        .map(|instance| {
            let metrics = instance.metrics();
            vec![
                instance.instance_key().to_string(),
                instance.tool_name().to_string(),
                instance.pid().to_string(),
                instance.port().to_string(),
                instance.session_id().unwrap_or("-").to_owned(),
                uptime(instance.start_time(), now),
                format!("{}/{}", metrics.messages_sent, metrics.messages_received),
            ]
        })
        .collect();
    table(
        out,
        &["INSTANCE", "TOOL", "PID", "PORT", "SESSION", "UPTIME", "SENT/RECV"],
        &rows,
    )
}

pub(super) fn instance_detail<W: Write>(
    out: &mut W,
    instance: &RunningInstance,
    now: DateTime<Utc>,
) -> io::Result<()> {
    let metrics = instance.metrics();
    writeln!(out, "instance:  {}", instance.instance_key())?;
    writeln!(out, "tool:      {}", instance.tool_name())?;
    writeln!(out, "status:    {}", instance.status())?;
    writeln!(out, "pid:       {}", instance.pid())?;
    writeln!(out, "port:      {}", instance.port())?;
    if let Some(session) = instance.session_id() {
        writeln!(out, "session:   {session}")?;
    }
    writeln!(out, "started:   {}", instance.start_time().to_rfc3339())?;
    if instance.is_running() {
        writeln!(out, "uptime:    {}", uptime(instance.start_time(), now))?;
    }
    writeln!(
        out,
        "messages:  {} sent, {} received, {} errors",
        metrics.messages_sent, metrics.messages_received, metrics.errors
    )?;
    writeln!(out, "latency:   {} ms", metrics.latency_ms)
}

fn capability_list(definition: &ToolDefinition) -> String {
    definition
        .capabilities()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn uptime(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = now.signed_duration_since(start).num_seconds().max(0);
    let hours = total.checked_div(3600).unwrap_or_default();
    let minutes = total.checked_rem(3600).unwrap_or_default().checked_div(60).unwrap_or_default();
    let seconds = total.checked_rem(60).unwrap_or_default();
    if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::{definitions, instances, uptime};
    use crate::instance::domain::{InstanceKey, RunningInstance};
    use crate::tool_definition::domain::{ToolName, builtin_definitions};
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    #[rstest]
    #[case(5, "5s")]
    #[case(65, "1m05s")]
    #[case(3_725, "1h02m05s")]
    fn formats_uptime(#[case] seconds: i64, #[case] expected: &str) {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid time");
        assert_eq!(uptime(start, start + Duration::seconds(seconds)), expected);
    }

    #[rstest]
    fn definitions_table_lists_builtins_with_header() {
        let mut out = Vec::new();
        definitions(&mut out, &builtin_definitions()).expect("renders");
        let text = String::from_utf8(out).expect("utf8");

        let mut lines = text.lines();
        assert!(lines.next().is_some_and(|header| header.starts_with("NAME")));
        assert!(text.contains("claude-code"));
        assert!(text.contains("8401"));
    }

    #[rstest]
    fn instances_table_shows_key_and_port() {
        let now = Utc::now();
        let instance = RunningInstance::new(
            InstanceKey::new("b").expect("valid key"),
            ToolName::new("cat").expect("valid name"),
            77,
            9123,
            None,
            now,
        );
        let mut out = Vec::new();
        instances(&mut out, &[instance], now).expect("renders");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("9123"));
        assert!(text.lines().nth(1).is_some_and(|row| row.starts_with("b ")));
    }

    #[rstest]
    fn empty_instance_list_says_so() {
        let mut out = Vec::new();
        instances(&mut out, &[], Utc::now()).expect("renders");
        assert_eq!(String::from_utf8(out).expect("utf8"), "No running instances\n");
    }
}
