//! Tracing setup for binaries and tests that want log output
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! left to whoever embeds it.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Returns `false` if a global subscriber was already installed, so repeated
/// calls from tests are harmless.
pub fn init_tracing() -> bool {
    init_tracing_with("info")
}

/// As `init_tracing`, with `default_directive` used when `RUST_LOG` is unset
pub fn init_tracing_with(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_noop() {
        init_tracing_with("debug");
        assert!(!init_tracing());
    }
}
