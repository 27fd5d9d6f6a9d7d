use std::path::{Path, PathBuf};
use tokio::fs as async_fs;

use crate::application::services::description_service::{
    DescriptionFormat, DescriptionService, ParseOptions,
};
use crate::common::error::ConfigError;
use crate::domain::entities::externals_description::ExternalsDescription;

/// Default name of the top-level description file
pub const DEFAULT_DESCRIPTION_FILE: &str = "Externals.cfg";

/// Reads externals descriptions from disk
#[derive(Debug, Clone, Default)]
pub struct DescriptionStore {
    service: DescriptionService,
}

impl DescriptionStore {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            service: DescriptionService::new(options),
        }
    }

    /// Read and parse the description at `path`.
    ///
    /// The returned description's `source` is the canonical path, so relative
    /// `local_path` values resolve against the directory the file really lives in.
    pub async fn read(&self, path: &Path) -> Result<ExternalsDescription, ConfigError> {
        let source = self.locate(path).await?;
        let content = async_fs::read_to_string(&source)
            .await
            .map_err(|e| ConfigError::new(&source, format!("cannot read description: {e}")))?;
        tracing::debug!(file = %source.display(), "parsing externals description");
        self.service
            .parse_str(&content, &source, DescriptionFormat::from_path(&source))
    }

    /// Whether `path` names an existing regular file.
    pub async fn is_file(&self, path: &Path) -> bool {
        matches!(async_fs::metadata(path).await, Ok(meta) if meta.is_file())
    }

    /// Canonical path of an existing description file.
    pub async fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
        match async_fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(ConfigError::new(path, "description path is not a file")),
            Err(_) => return Err(ConfigError::new(path, "description file does not exist")),
        }
        async_fs::canonicalize(path)
            .await
            .map_err(|e| ConfigError::new(path, format!("cannot resolve description path: {e}")))
    }
}
