//! Subcommand implementations and the wiring they share.

pub mod assign_foods;
pub mod copy_data;
pub mod grade;
pub mod init;
pub mod progress;
pub mod run;
pub mod schema;
pub mod seed;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use gellyfish_client::{create_client, GellyfishConfig, InMemoryBackend};
use gellyfish_core::progress::{LocalProgressStore, StorageKeys};
use gellyfish_core::report::save_json;
use gellyfish_core::storage::FileStore;
use gellyfish_core::traits::{Backend, ProgressApi, QueryRunner, RecordApi, SchemaSource};

/// Global options.
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub env: Option<String>,
    pub offline: bool,
}

/// One backend, viewed through each of its traits.
pub struct Services {
    pub queries: Arc<dyn QueryRunner>,
    pub progress: Arc<dyn ProgressApi>,
    pub records: Arc<dyn RecordApi>,
    pub schemas: Arc<dyn SchemaSource>,
}

impl Services {
    fn from_backend<B: Backend + 'static>(backend: Arc<B>) -> Self {
        Self {
            queries: backend.clone(),
            progress: backend.clone(),
            records: backend.clone(),
            schemas: backend,
        }
    }
}

impl Context {
    pub fn config(&self) -> Result<GellyfishConfig> {
        gellyfish_client::config::load_config_from(self.config_path.as_deref())
    }

    /// Backend for `env`, or the selected environment when `None`.
    pub fn connect(&self, config: &GellyfishConfig, env: Option<&str>) -> Result<Services> {
        if self.offline {
            tracing::debug!("using in-memory backend");
            return Ok(Services::from_backend(Arc::new(InMemoryBackend::new())));
        }
        let client = create_client(env.or(self.env.as_deref()), config)?;
        Ok(Services::from_backend(Arc::new(client)))
    }

    /// Anonymous progress kept in the configured storage file.
    pub fn local_progress(&self, config: &GellyfishConfig) -> LocalProgressStore {
        LocalProgressStore::new(
            Arc::new(FileStore::new(&config.storage_path)),
            StorageKeys::for_app(&config.app_id),
        )
    }
}

/// Read a text file, naming it in the error.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Print a report as JSON and optionally save it.
pub fn emit_report<T: Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    if let Some(path) = output {
        save_json(report, path)?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}
