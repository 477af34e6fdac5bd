//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, show, path)
//! - [`replay`] - Replay a recorded stream through the filter
//! - [`tracks`] - Stored track management (list, show, export, delete)

pub mod common;
pub mod config;
pub mod replay;
pub mod tracks;
