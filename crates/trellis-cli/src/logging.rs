//! Tracing setup for the trellis binary

use anyhow::{Context, Result};
use std::io;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a log filter, e.g. `trellis_build=debug`
pub const LOG_ENV_VAR: &str = "TRELLIS_LOG";

/// Pick the log filter: TRELLIS_LOG, then the global config, then the default
pub fn filter_directive(env_value: Option<String>, configured: Option<&str>, verbose: bool) -> String {
    match env_value.filter(|v| !v.trim().is_empty()) {
        Some(value) => value,
        None => match configured {
            Some(value) => value.to_string(),
            // By default, show warnings/errors
            None if verbose => "debug".to_string(),
            None => "warn".to_string(),
        },
    }
}

/// Install a stderr subscriber so stdout stays reserved for plan output
pub fn init(configured: Option<&str>, verbose: bool) -> Result<()> {
    let directive = filter_directive(std::env::var(LOG_ENV_VAR).ok(), configured, verbose);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Failed to parse log filter '{}'", directive))?;

    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(verbose)
        .with_filter(filter);

    // A subscriber may already be installed when running under a test harness
    let _ = tracing_subscriber::registry().with(layer).try_init();
    Ok(())
}
