//! Scoped process environment changes for tests that read `TOOLBRIDGE_*`
//! variables.

use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Holds the environment lock and restores every touched variable on drop.
pub struct EnvVarGuard {
    previous: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Applies `changes`; `None` removes the variable.
    pub fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        let lock = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = changes
            .iter()
            .map(|(name, value)| {
                let saved = env::var_os(name);
                // SAFETY: ENV_MUTEX serialises environment mutation across tests.
                unsafe { assign(name, value.map(OsString::from)) };
                ((*name).to_owned(), saved)
            })
            .collect();
        Self {
            previous,
            _lock: lock,
        }
    }

    /// Clears every override variable the loader reads.
    pub fn cleared() -> Self {
        Self::apply(&[
            ("TOOLBRIDGE_CONFIG", None),
            ("TOOLBRIDGE_STATE_DIR", None),
            ("TOOLBRIDGE_PORT_BASE", None),
            ("TOOLBRIDGE_LOG", None),
        ])
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (name, value) in self.previous.drain(..).rev() {
            // SAFETY: the guard still holds ENV_MUTEX.
            unsafe { assign(&name, value) };
        }
    }
}

unsafe fn assign(name: &str, value: Option<OsString>) {
    unsafe {
        match value {
            Some(value) => env::set_var(name, value),
            None => env::remove_var(name),
        }
    }
}
