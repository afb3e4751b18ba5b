//! CLI module for actloop - command-line interface and subcommands.
//!
//! Provides the entry point with subcommands for running an objective,
//! listing captured artifacts, and showing the effective configuration.

pub mod commands;

pub use commands::Cli;
