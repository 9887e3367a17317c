//! Executable discovery.

use camino::{Utf8Path, Utf8PathBuf};

/// Install locations searched after `PATH`.
const KNOWN_LOCATIONS: [&str; 4] = ["~/.local/bin", "/usr/local/bin", "/opt/homebrew/bin", "/usr/bin"];

/// Resolves a configured executable to an absolute file path.
///
/// A value containing `/` is treated as a path (a leading `~/` expands to
/// the home directory) and must name an executable file. A bare command
/// name is searched on `PATH`, then in well-known install locations, then
/// in `extra_locations`.
#[must_use]
pub fn locate_executable(configured: &str, extra_locations: &[Utf8PathBuf]) -> Option<Utf8PathBuf> {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('/') {
        let candidate = expand_home(trimmed)?;
        return is_executable_file(&candidate).then_some(candidate);
    }

    let path_dirs = std::env::var_os("PATH")
        .map(|raw| {
            std::env::split_paths(&raw)
                .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let known = KNOWN_LOCATIONS.iter().filter_map(|location| expand_home(location));

    path_dirs
        .into_iter()
        .chain(known)
        .chain(extra_locations.iter().cloned())
        .map(|dir| dir.join(trimmed))
        .find(|candidate| is_executable_file(candidate))
}

/// Expands a leading `~/` to the current user's home directory.
#[must_use]
pub fn expand_home(raw: &str) -> Option<Utf8PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .and_then(|home| Utf8PathBuf::from_path_buf(home).ok())
            .map(|home| home.join(rest)),
        None => Some(Utf8PathBuf::from(raw)),
    }
}

/// Returns `true` for regular files with an execute bit.
#[must_use]
pub fn is_executable_file(path: &Utf8Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
