use crate::error::Result;
use crate::raster::Raster;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Decoded rasters keyed by file path
pub struct RasterCache {
    data: Mutex<HashMap<PathBuf, Arc<Raster>>>,
    capacity: usize,
}

impl RasterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn get(&self, key: &Path) -> Option<Arc<Raster>> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.get(key).cloned()
    }

    pub fn set(&self, key: PathBuf, value: Arc<Raster>) {
        if self.capacity == 0 {
            return;
        }
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        if data.len() >= self.capacity && !data.contains_key(&key) {
            // A simple eviction strategy: clear the cache when full.
            data.clear();
        }
        data.insert(key, value);
    }

    /// Cached raster for `path`, decoding it on a miss
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<Raster>> {
        if let Some(raster) = self.get(path) {
            log::debug!("Raster cache hit for {}", path.display());
            return Ok(raster);
        }
        let raster = Arc::new(Raster::open(path)?);
        self.set(path.to_path_buf(), Arc::clone(&raster));
        Ok(raster)
    }

    /// Drop `path`, e.g. after the file was re-downloaded
    pub fn invalidate(&self, path: &Path) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.remove(path);
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
