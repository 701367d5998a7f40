//! Factorec Common
//!
//! Shared error taxonomy for the Factorec recommendation engine and its
//! HTTP surface.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

pub mod error;

pub use error::{FactorecError, Result};
