use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use credit_config::{
    ConfigWarning, CreditConfig, apply_env_overrides, config_path, ensure_workspace_config,
    validate_config,
};
use credit_drift::{DriftEngine, DriftSettings};
use credit_store::{SqliteStore, StoreError};

/// Resolved workspace root plus its effective configuration.
#[derive(Debug, Clone)]
pub struct CreditWorkspace {
    root: PathBuf,
    config: CreditConfig,
}

impl CreditWorkspace {
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with_env(root, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(root: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to resolve workspace path {}", root.display()))?;

        let config = ensure_workspace_config(&root).with_context(|| {
            format!(
                "failed to load or create workspace config at {}",
                config_path(&root).display()
            )
        })?;
        let (config, mut warnings) = apply_env_overrides(config, lookup);
        warnings.extend(validate_config(&config));
        log_warnings(&warnings);

        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CreditConfig {
        &self.config
    }

    pub fn open_store(&self) -> Result<Arc<SqliteStore>, StoreError> {
        SqliteStore::open_workspace(&self.root, &self.config.store).map(Arc::new)
    }

    pub fn drift_engine(&self, store: Arc<SqliteStore>) -> DriftEngine {
        DriftEngine::new(
            store.clone(),
            store,
            DriftSettings::from_config(&self.config.drift),
        )
    }
}

fn log_warnings(warnings: &[ConfigWarning]) {
    for warning in warnings {
        tracing::warn!(code = warning.code, "config warning: {}", warning.message);
    }
}
