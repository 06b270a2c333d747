//! Command line settings.
//!
//! The build descriptor (origin, manifest, core files) is read from the path
//! given with `--config`. Cache namespaces live under
//! `~/.cache/shellcache/<host>` unless `--cache-dir` says otherwise.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shellcache_core::WorkerConfig;

/// Application name used for cache directory paths
const APP_NAME: &str = "shellcache";

#[derive(Debug)]
pub struct Settings {
    pub worker: WorkerConfig,
    pub cache_dir: PathBuf,
}

impl Settings {
    pub fn load(config_path: &Path, cache_dir: Option<PathBuf>) -> Result<Self> {
        let worker = WorkerConfig::load(config_path)
            .with_context(|| format!("Failed to load build descriptor: {}", config_path.display()))?;

        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => Self::default_cache_dir(&worker)?,
        };

        Ok(Self { worker, cache_dir })
    }

    fn default_cache_dir(worker: &WorkerConfig) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(origin_dir_name(worker)))
    }
}

/// Directory name for an origin, e.g. `app.example.com` or `localhost_8080`.
fn origin_dir_name(worker: &WorkerConfig) -> String {
    let host = worker.origin.host_str().unwrap_or("unknown");
    let name = match worker.origin.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host.to_string(),
    };
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
