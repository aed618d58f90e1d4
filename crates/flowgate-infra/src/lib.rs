//! Infrastructure layer for flowgate.
//!
//! Implements the ports defined in `flowgate-core` and everything that
//! touches the filesystem: TOML engine config, JSON/YAML workflow and schema
//! documents, and the SHA-256 integrity hasher.

pub mod config;
pub mod document;
pub mod hash;
