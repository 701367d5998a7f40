// =============================================================================
// Factorec - Clap Module
// =============================================================================
//
// Author: arkSong (arksong2018@gmail.com)
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Command line interface of the factorec binary: run the HTTP service,
//   train once, query recommendations and inspect the active model.
//
// =============================================================================

use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Returns the current version of the crate with extra info if supplied
///
/// Set the environment variable `FACTOREC_VERSION_EXTRA` at build time to
/// include it in parenthesis after the SemVer version.
pub fn version() -> String {
    let cargo_pkg_version = env!("CARGO_PKG_VERSION");

    match option_env!("FACTOREC_VERSION_EXTRA") {
        Some(x) => format!("{} ({})", cargo_pkg_version, x),
        None => cargo_pkg_version.to_owned(),
    }
}

/// Factorec - collaborative-filtering recommendation service
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(about, version, name = "factorec")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "FACTOREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter override (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP recommendation service
    Serve {
        /// Address to bind to
        #[arg(short, long)]
        address: Option<IpAddr>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Disable periodic retraining even if configured
        #[arg(long)]
        no_schedule: bool,
    },

    /// Retrain the model once and exit
    Train {
        /// Train from a JSON export file instead of the provider
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Upper bound on the factorization rank (1-50)
        #[arg(long)]
        max_components: Option<usize>,

        /// Iteration budget (1-100)
        #[arg(long)]
        max_iter: Option<usize>,
    },

    /// Print recommendations for a user from the persisted model
    Recommend {
        /// External user id
        user_id: i64,

        /// Number of items to return
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// Print statistics about the persisted model
    Stats,

    /// Print the effective configuration as TOML
    ShowConfig,
}

/// Parse command line arguments into structured form
pub fn parse() -> Args {
    Args::parse()
}
