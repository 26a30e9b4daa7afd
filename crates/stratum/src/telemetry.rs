//! Tracing subscriber setup for applications embedding stratum.
//!
//! `RUST_LOG` takes precedence over the built-in filters.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "stratum=debug,stratum_cache=debug,stratum_session=debug,stratum_config=debug,info"
    } else {
        "stratum=info,stratum_cache=info,stratum_session=info,stratum_config=info,warn"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

/// Install a human-readable subscriber on stderr.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(verbose: bool) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(env_filter(verbose)),
        )
        .try_init()
        .is_ok()
}

/// Install a JSON subscriber on stdout, one object per event.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_json_tracing(verbose: bool) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_filter(env_filter(verbose)),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        for verbose in [true, false] {
            assert!(EnvFilter::try_new(default_filter(verbose)).is_ok());
        }
        assert!(default_filter(true).contains("stratum_cache=debug"));
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing(false);
        assert!(!init_json_tracing(false));
        assert!(!init_tracing(true));
    }
}
