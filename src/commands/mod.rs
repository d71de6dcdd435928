//! Command definitions. Each module exposes `node()` returning its subtree.

pub mod account;
pub mod actions;
pub mod auth;
pub mod droplet_actions;
pub mod droplets;
pub mod serverless;
pub mod version;

use crate::error::{Error, Result};

/// Parse a numeric resource id given as a positional argument.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid(format!("{} id {:?} is not a number", what, raw)))
}
