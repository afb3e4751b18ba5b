//! Oracle Client Layer - the remote service that proposes actions
//!
//! This module provides:
//! - OracleClient trait for the task/run/turn contract
//! - AssistantsClient, an HTTP implementation for assistants-style thread APIs
//! - ScriptedOracle, an in-memory implementation driven by a script

pub mod assistants;
pub mod client;
pub mod scripted;

pub use assistants::{AssistantsClient, AssistantsConfig};
pub use client::OracleClient;
pub use scripted::{ScriptedOracle, ScriptedRun};
