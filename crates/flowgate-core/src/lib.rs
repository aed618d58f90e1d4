//! Workflow graph engine for flowgate.
//!
//! This crate owns the computational core: the in-memory [`graph`] model,
//! deterministic [`layout`], the two-tier [`validator`] and the
//! [`execution`] engine with write gating. It also defines the ports
//! (`NodeExecutor`, `IntegrityHasher`) that adapters implement. It depends
//! only on `flowgate-types` -- never on `flowgate-infra` or any IO crate.

pub mod event;
pub mod execution;
pub mod graph;
pub mod integrity;
pub mod layout;
pub mod service;
pub mod validator;
