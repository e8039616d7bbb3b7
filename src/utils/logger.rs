use crate::utils::error::{Result, StackmateError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose {
        "stackmate=debug,info"
    } else {
        "stackmate=info,warn"
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Human-readable output. `RUST_LOG` overrides the verbosity flag.
pub fn init_logger(verbose: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| StackmateError::config(format!("Logger already initialised: {}", e)))
}

/// One JSON object per event, for log collectors.
pub fn init_json_logger() -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .json(),
        )
        .try_init()
        .map_err(|e| StackmateError::config(format!("Logger already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_initialisation_fails_cleanly() {
        // whichever call comes first wins the global subscriber
        let first = init_logger(true);
        let second = init_json_logger();
        assert!(first.is_err() || second.is_err());
    }
}
