//! Process-wide handle to the current catalog with explicit reload

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::{info, warn};

use super::{Catalog, CatalogOptions};
use crate::error::{Error, Result};

/// Holds the active catalog; readers take cheap `Arc` snapshots
#[derive(Debug)]
pub struct CatalogStore {
    source: Option<PathBuf>,
    options: CatalogOptions,
    current: RwLock<Arc<Catalog>>,
}

impl CatalogStore {
    /// Load the catalog at `path`; later reloads read the same file
    pub fn open<P: AsRef<Path>>(path: P, options: CatalogOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let catalog = Catalog::from_csv_path(&path, options.clone())?;
        info!("Catalog loaded from {} ({} countries)", path.display(), catalog.len());
        Ok(Self {
            source: Some(path),
            options,
            current: RwLock::new(Arc::new(catalog)),
        })
    }

    /// Wrap an already built catalog (no reload source)
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            source: None,
            options: catalog.options().clone(),
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Re-read the source file. On failure the previous catalog stays active.
    pub fn reload(&self) -> Result<Arc<Catalog>> {
        let path = self
            .source
            .as_ref()
            .ok_or_else(|| Error::Config("catalog has no source file to reload".to_string()))?;

        match Catalog::from_csv_path(path, self.options.clone()) {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                *self.current.write().unwrap_or_else(|e| e.into_inner()) = catalog.clone();
                info!("Catalog reloaded from {} ({} countries)", path.display(), catalog.len());
                Ok(catalog)
            }
            Err(e) => {
                warn!("Catalog reload from {} failed, keeping previous: {}", path.display(), e);
                Err(e)
            }
        }
    }
}
