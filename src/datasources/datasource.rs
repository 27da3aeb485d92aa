use crate::config::{CountryConfig, PathConfig};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Storage layout shared by every data source.
///
/// Raw data lives under `base/{public|private}/raw/{iso3|glb}/{module}` and
/// processed data under `base/{public|private}/processed/{iso3}/{module}`.
#[derive(Debug, Clone)]
pub struct DataSource {
    country_config: CountryConfig,
    module_base_dir: String,
    raw_base_dir: PathBuf,
    processed_base_dir: PathBuf,
}

impl DataSource {
    pub fn new(
        paths: &PathConfig,
        country_config: CountryConfig,
        module_base_dir: &str,
        is_public: bool,
        is_global_raw: bool,
    ) -> Self {
        let raw_base_dir = base_dir(paths, &country_config.iso3, module_base_dir, is_public, true, is_global_raw);
        let processed_base_dir = base_dir(paths, &country_config.iso3, module_base_dir, is_public, false, false);
        Self {
            country_config,
            module_base_dir: module_base_dir.to_string(),
            raw_base_dir,
            processed_base_dir,
        }
    }

    pub fn country_config(&self) -> &CountryConfig {
        &self.country_config
    }

    pub fn iso3(&self) -> &str {
        &self.country_config.iso3
    }

    pub fn module_base_dir(&self) -> &str {
        &self.module_base_dir
    }

    pub fn raw_base_dir(&self) -> &Path {
        &self.raw_base_dir
    }

    pub fn processed_base_dir(&self) -> &Path {
        &self.processed_base_dir
    }
}

fn base_dir(
    paths: &PathConfig,
    iso3: &str,
    module_base_dir: &str,
    is_public: bool,
    is_raw: bool,
    is_global: bool,
) -> PathBuf {
    let visibility = if is_public { &paths.public } else { &paths.private };
    let stage = if is_raw { &paths.raw } else { &paths.processed };
    let scope = if is_global { paths.global.as_str() } else { iso3 };
    paths
        .base_dir
        .join(visibility)
        .join(stage)
        .join(scope)
        .join(module_base_dir)
}

/// Skip producing `path` when it already exists, unless `clobber` is set.
///
/// Returns the path either way so callers can chain on the result.
pub fn check_file_existence<F>(path: &Path, clobber: bool, produce: F) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if path.exists() && !clobber {
        log::debug!(
            "File {} exists and clobber set to false, not recreating",
            path.display()
        );
        return Ok(path.to_path_buf());
    }
    produce(path)?;
    Ok(path.to_path_buf())
}

/// Create the parent directory of `path` if needed
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
