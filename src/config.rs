//! Process-wide configuration, read once from the environment (§6).
//!
//! Renamed from the source's `AIOLOGIC_*` variables to this crate's own
//! namespace, since the runtime names differ (see `SPEC_FULL.md`'s
//! Configuration section): `INTERLOCK_THREADS_CHECKPOINTS`,
//! `INTERLOCK_TOKIO_CHECKPOINTS`, `INTERLOCK_PERFECT_FAIRNESS`.

use interlock_rt::sync::OnceLock;

/// Fairness-related knobs shared by every primitive.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Whether the threads (green) side inserts fairness checkpoints.
    pub threads_checkpoints: bool,
    /// Whether the tokio (async) side inserts fairness checkpoints.
    pub tokio_checkpoints: bool,
    /// Strict FIFO under cancellation (§4.F "Fairness"). Off by default —
    /// see `DESIGN.md`'s Open Question resolution 5.
    pub perfect_fairness: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads_checkpoints: true,
            tokio_checkpoints: true,
            perfect_fairness: false,
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => !matches!(value.trim(), "0" | "false" | "False" | "FALSE" | ""),
        Err(_) => default,
    }
}

fn read_from_env() -> Config {
    let defaults = Config::default();
    Config {
        threads_checkpoints: env_bool(
            "INTERLOCK_THREADS_CHECKPOINTS",
            defaults.threads_checkpoints,
        ),
        tokio_checkpoints: env_bool("INTERLOCK_TOKIO_CHECKPOINTS", defaults.tokio_checkpoints),
        perfect_fairness: env_bool("INTERLOCK_PERFECT_FAIRNESS", defaults.perfect_fairness),
    }
}

/// Returns the process-wide configuration, reading the environment on the
/// first call and caching the result for the remainder of the process.
pub fn current() -> Config {
    *CONFIG.get_or_init(read_from_env)
}

/// Forces the process-wide configuration for the remainder of the process.
///
/// Has no effect once [`current`] (or this function) has already run once,
/// matching the "read once at import" contract. Intended for test
/// harnesses that need `perfect_fairness` or a checkpoint flag pinned to a
/// known value; production code should prefer the environment variables so
/// the setting is visible at process startup.
pub fn set_override(config: Config) {
    let _ = CONFIG.set(config);
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        // Reads whatever the test process's real environment provides;
        // only asserts the type round-trips without panicking.
        let config = current();
        let _ = config.perfect_fairness;
    }
}
