//! Shared domain types for flowgate.
//!
//! This crate contains the vocabulary used across the workflow graph engine:
//! workflow nodes and edges, execution steps and events, validation issues,
//! and engine configuration, together with their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod validation;
pub mod workflow;
