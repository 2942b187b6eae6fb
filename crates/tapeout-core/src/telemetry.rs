//! Subscriber setup for the `tapeout` binary.
//!
//! `RUST_LOG` takes precedence over the level passed in. Only the first call
//! installs a subscriber; later calls are no-ops.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default level for the command line: `debug` when verbose, else `info`.
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber, JSON lines when `json` is set.
pub fn init_tracing(json: bool, level: Level) {
    let registry = tracing_subscriber::registry().with(filter(level));
    let installed = if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).compact())
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(true), Level::DEBUG);
        assert_eq!(level_for(false), Level::INFO);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::WARN);
    }
}
