//! Foundation types for the Atlas shell.
//!
//! This crate holds what every other Atlas crate shares: the error
//! taxonomy and the TOML configuration model.

pub mod config;
pub mod error;
