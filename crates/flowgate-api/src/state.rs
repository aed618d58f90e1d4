//! Application state for CLI commands.
//!
//! Holds the loaded configuration and pins the generic `WorkflowService` to
//! the concrete infra hasher.

use std::path::{Path, PathBuf};

use anyhow::Context;
use flowgate_core::execution::ExecutorRegistry;
use flowgate_core::service::WorkflowService;
use flowgate_infra::config::{default_config_path, load_engine_config, read_engine_config};
use flowgate_infra::hash::Sha256IntegrityHasher;
use flowgate_types::config::EngineConfig;

pub type ConcreteWorkflowService = WorkflowService<Sha256IntegrityHasher>;

pub struct AppState {
    pub config: EngineConfig,
    pub config_path: PathBuf,
}

impl AppState {
    /// Load configuration.
    ///
    /// An explicit `--config` path must exist and parse; the default path
    /// falls back to built-in defaults.
    pub async fn init(config_override: Option<&Path>) -> anyhow::Result<Self> {
        let (config, config_path) = match config_override {
            Some(path) => {
                let config = read_engine_config(path)
                    .await
                    .with_context(|| format!("Failed to load config {}", path.display()))?;
                (config, path.to_path_buf())
            }
            None => {
                let path = default_config_path();
                (load_engine_config(&path).await, path)
            }
        };
        tracing::debug!(config = %config_path.display(), "configuration loaded");
        Ok(Self {
            config,
            config_path,
        })
    }

    /// A service wired to `registry` and the SHA-256 hasher.
    pub fn service(&self, registry: ExecutorRegistry) -> ConcreteWorkflowService {
        WorkflowService::new(&self.config, registry, Sha256IntegrityHasher::new())
    }
}
