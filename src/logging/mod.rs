// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays clean for reports. `RUST_LOG` takes
//! precedence over the configured level.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::config::LoggingConfig;

/// Filter directive for the given config, raised to debug when verbose
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.level.trim().to_string()
    }
}

/// Build the filter, preferring `RUST_LOG` when set
pub fn build_filter(directive: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directive)
            .with_context(|| format!("Invalid log level: {:?}", directive)),
    }
}

/// Initialize the global subscriber
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = build_filter(&default_directive(config, verbose))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
