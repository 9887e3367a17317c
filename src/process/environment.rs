//! Child environment preparation.

use std::collections::BTreeMap;
use std::ffi::OsString;

/// Variable carrying the tool definition name.
pub const TOOL_NAME_VAR: &str = "CI_TOOL_NAME";
/// Variable carrying the instance key.
pub const INSTANCE_KEY_VAR: &str = "CI_INSTANCE_KEY";
/// Variable carrying the bridge port.
pub const PORT_VAR: &str = "CI_TOOL_PORT";
/// Variable carrying the session identifier, when one was given.
pub const SESSION_VAR: &str = "CI_SESSION_ID";

/// Values identifying one running instance to its child process.
#[derive(Debug, Clone, Copy)]
pub struct InstanceIdentity<'a> {
    /// Tool definition name.
    pub tool_name: &'a str,
    /// Instance key (tool name or alias).
    pub instance_key: &'a str,
    /// Bridge port.
    pub port: u16,
    /// Session identifier.
    pub session_id: Option<&'a str>,
}

/// Merges the parent environment, the instance identity and the
/// definition's overrides, later sources winning.
///
/// Parent variables that are not valid UTF-8 are dropped.
pub fn prepare_environment<I>(
    parent: I,
    identity: &InstanceIdentity<'_>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut environment: BTreeMap<String, String> = parent
        .into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();

    environment.insert(TOOL_NAME_VAR.to_owned(), identity.tool_name.to_owned());
    environment.insert(INSTANCE_KEY_VAR.to_owned(), identity.instance_key.to_owned());
    environment.insert(PORT_VAR.to_owned(), identity.port.to_string());
    match identity.session_id {
        Some(session) => {
            environment.insert(SESSION_VAR.to_owned(), session.to_owned());
        }
        None => {
            environment.remove(SESSION_VAR);
        }
    }

    environment.extend(overrides.iter().map(|(key, value)| (key.clone(), value.clone())));
    environment
}
