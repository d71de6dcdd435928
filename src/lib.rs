//! oceanctl - command-line client for the cloud API
//!
//! The binary is a thin shim over [`app::App`]. Everything a command needs
//! (configuration, output, services, prompts, action polling) is reachable
//! from the [`context::CmdContext`] handed to its handler.

pub mod api;
pub mod app;
pub mod cancel;
pub mod cli;
pub mod command;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod context;
pub mod displayers;
pub mod error;
pub mod output;
pub mod prompt;
pub mod services;
pub mod tabwriter;
pub mod waiter;

pub use app::App;
pub use error::{Error, Result};
