//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the configuration set one
pub const DEFAULT_FILTER: &str = "heatcast=info";

/// Build the filter: `RUST_LOG` wins over `default_filter`
pub fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a `fmt` subscriber as the global default.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is kept.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_default_falls_back() {
        // An unparsable directive must not panic
        let _ = filter("heatcast=[[[");
    }

    #[test]
    fn second_init_is_harmless() {
        let _ = init("debug");
        assert!(!init("trace"));
    }
}
