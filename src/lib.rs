// =============================================================================
// Factorec - Library Crate
// =============================================================================
//
// Author: arkSong (arksong2018@gmail.com)
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Binary-side glue for the factorec service: CLI definition, configuration
//   loading and tracing setup. The pipeline itself lives in factorec-engine
//   and the HTTP surface in factorec-api.
//
// =============================================================================

pub mod clap;
pub mod config;

pub use config::Config;

// Re-export workspace crates
pub use factorec_api as api;
pub use factorec_common as common;
pub use factorec_engine as engine;

use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the global subscriber: `EnvFilter` from `filter` plus a fmt layer.
///
/// An invalid filter falls back to `warn` and is reported on stderr.
pub fn init_tracing(filter: &str) {
    let registry = tracing_subscriber::Registry::default();
    let fmt_layer = tracing_subscriber::fmt::Layer::new();
    let filter_layer = match EnvFilter::try_new(filter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid log filter {:?} ({}), falling back to \"warn\"", filter, e);
            EnvFilter::new("warn")
        }
    };

    let subscriber = registry.with(filter_layer).with(fmt_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}
