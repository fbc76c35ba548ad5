//! CLI subcommands.

pub mod app_name;
pub mod common;
pub mod config;
pub mod install;
pub mod resolve;
