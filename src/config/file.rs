//! Configuration file discovery and loading.

use super::{ConfigError, Settings};
use camino::{Utf8Path, Utf8PathBuf};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "TOOLBRIDGE_CONFIG";

/// Project-local configuration file name.
const LOCAL_CONFIG_NAME: &str = "toolbridge.toml";

/// Configuration file name inside the per-user config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for directory lookup.
pub(crate) const APP_NAME: &str = "toolbridge";

/// Loads settings from the first configuration file found, then applies
/// environment overrides and validates the result.
///
/// Search order:
/// 1. `explicit`, when given
/// 2. `$TOOLBRIDGE_CONFIG`
/// 3. `./toolbridge.toml`
/// 4. `<config_dir>/toolbridge/config.toml`
///
/// Missing files fall back to defaults. An explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError`] when a file cannot be read or parsed, when an
/// override is malformed, or when validation fails.
pub fn load(explicit: Option<&Utf8Path>) -> Result<Settings, ConfigError> {
    let env_path = std::env::var(CONFIG_ENV_VAR).ok().map(Utf8PathBuf::from);
    let mut settings = match explicit.map(Utf8Path::to_path_buf).or(env_path) {
        Some(path) => from_path(&path)?,
        None => search_paths()
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map_or_else(|| Ok(Settings::default()), |path| from_path(&path))?,
    };

    settings.apply_overrides(|name| std::env::var(name).ok())?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from a specific TOML file without applying overrides.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn from_path(path: &Utf8Path) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    from_str(&contents)
}

/// Parses settings from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
pub fn from_str(toml_text: &str) -> Result<Settings, ConfigError> {
    Ok(toml::from_str(toml_text)?)
}

/// Returns the implicit configuration paths in search order.
#[must_use]
pub fn search_paths() -> Vec<Utf8PathBuf> {
    let mut paths = vec![Utf8PathBuf::from(LOCAL_CONFIG_NAME)];
    if let Some(config_dir) = dirs::config_dir().and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok()) {
        paths.push(config_dir.join(APP_NAME).join(XDG_CONFIG_NAME));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::{from_path, from_str};
    use crate::config::ConfigError;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    fn from_str_reads_sections() {
        let settings = from_str(
            r#"
state_dir = "/var/lib/toolbridge"

[ports]
base = 9100

[bridge]
queue_capacity = 16
"#,
        )
        .expect("valid configuration");

        assert_eq!(settings.ports.base, 9100);
        assert_eq!(settings.bridge.queue_capacity, 16);
        assert_eq!(
            settings.state_dir.as_deref().map(camino::Utf8Path::as_str),
            Some("/var/lib/toolbridge")
        );
    }

    #[rstest]
    fn from_str_rejects_unknown_keys() {
        let error = from_str("[ports]\nbsae = 1\n").expect_err("typo rejected");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[rstest]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[process]\ntermination_grace_ms = 250").expect("write");
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf8 path");

        let settings = from_path(&path).expect("loads");

        assert_eq!(settings.process.termination_grace_ms, 250);
    }

    #[rstest]
    fn from_path_reports_missing_file() {
        let error = from_path(camino::Utf8Path::new("/nonexistent/toolbridge.toml"))
            .expect_err("missing");
        assert!(matches!(error, ConfigError::Read { .. }));
    }
}
