use crate::catalog::Catalog;
use crate::store::{DirSource, HttpSource, IndexSource, IndexStore};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Where the site's `texts_indices/` documents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// The published site, e.g. `https://example.org/`
    Http { base_url: Url },
    /// A built site directory on disk
    Dir { root: PathBuf },
}

impl SourceConfig {
    pub fn build(&self) -> Result<Arc<dyn IndexSource>> {
        let source: Arc<dyn IndexSource> = match self {
            SourceConfig::Http { base_url } => Arc::new(
                HttpSource::new(base_url.clone()).context("Failed to create HTTP client")?,
            ),
            SourceConfig::Dir { root } => {
                anyhow::ensure!(root.is_dir(), "Site root {} is not a directory", root.display());
                Arc::new(DirSource::new(root.clone()))
            }
        };
        Ok(source)
    }

    /// Site root to serve static index documents from, if local
    pub fn root(&self) -> Option<&PathBuf> {
        match self {
            SourceConfig::Dir { root } => Some(root),
            SourceConfig::Http { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub catalog: Option<PathBuf>,
}

impl Config {
    pub fn new(base_url: Option<Url>, root: Option<PathBuf>, catalog: Option<PathBuf>) -> Result<Self> {
        let source = match (base_url, root) {
            (Some(base_url), None) => SourceConfig::Http { base_url },
            (None, Some(root)) => SourceConfig::Dir { root },
            (None, None) => SourceConfig::Dir {
                root: PathBuf::from("build"),
            },
            (Some(_), Some(_)) => anyhow::bail!("Use either a base URL or a site root, not both"),
        };
        Ok(Self { source, catalog })
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load(path),
            None => Ok(Catalog::default()),
        }
    }

    /// The store shared by every session of this process
    pub fn store(&self) -> Result<Arc<IndexStore>> {
        let catalog = Arc::new(self.load_catalog()?);
        let source = self.source.build()?;
        Ok(Arc::new(IndexStore::new(source, catalog)))
    }
}
