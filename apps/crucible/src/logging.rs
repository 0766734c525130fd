//! Tracing subscriber setup
//!
//! Logs always go to stderr so that command output on stdout stays
//! parseable. `RUST_LOG` wins over the level flags.

use tracing_subscriber::EnvFilter;

/// Default filter for the chosen verbosity
fn default_filter(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "info,crucible=debug,crucible_builder=debug,crucible_recipes=debug,crucible_net=debug"
    } else if verbose {
        "warn,crucible=info,crucible_builder=info,crucible_recipes=info"
    } else {
        "warn"
    }
}

/// Initialize the global subscriber; JSON mode emits JSON log lines
pub fn init_tracing(json_mode: bool, verbose: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, debug)));

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(debug)
            .with_env_filter(filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_parse() {
        for (verbose, debug) in [(false, false), (true, false), (false, true)] {
            assert!(EnvFilter::try_new(default_filter(verbose, debug)).is_ok());
        }
    }
}
