use crate::catalog::Catalog;
use crate::document::DocumentCollection;
use crate::error::StoreError;
use crate::trace::DebugLog;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where index documents are read from
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Raw bytes of the document at a site-relative path
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}

/// Fetches index documents from the published site
pub struct HttpSource {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpSource {
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl IndexSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|_| StoreError::OutsideRoot(path.to_string()))?;
        let http_err = |source| StoreError::Http {
            path: path.to_string(),
            source,
        };

        let resp = self.http.get(url).send().await.map_err(http_err)?;
        if !resp.status().is_success() {
            return Err(StoreError::Status {
                path: path.to_string(),
                status: resp.status(),
            });
        }
        let body = resp.bytes().await.map_err(http_err)?;
        Ok(body.to_vec())
    }
}

/// Reads index documents from a built site directory
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StoreError::OutsideRoot(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl IndexSource for DirSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file).await.map_err(|source| StoreError::Io {
            path: path.to_string(),
            source,
        })
    }
}

/// Session cache of document collections, filled on demand.
///
/// Entries are only ever added; a slug fetched once is never fetched again.
pub struct IndexStore {
    source: Arc<dyn IndexSource>,
    catalog: Arc<Catalog>,
    cache: RwLock<HashMap<String, Arc<DocumentCollection>>>,
}

impl IndexStore {
    pub fn new(source: Arc<dyn IndexSource>, catalog: Arc<Catalog>) -> Self {
        Self {
            source,
            catalog,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Snapshot of everything loaded so far
    pub fn resident(&self) -> HashMap<String, Arc<DocumentCollection>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_resident(&self, slug: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(slug)
    }

    /// Make every requested text resident.
    ///
    /// Fetches run one after another; the first failure aborts the load and
    /// nothing fetched by this call is kept.
    pub async fn ensure_loaded(
        &self,
        slugs: &[String],
        trace: &mut DebugLog,
    ) -> Result<HashMap<String, Arc<DocumentCollection>>, StoreError> {
        let mut missing: Vec<&String> = Vec::new();
        for slug in slugs {
            if !self.is_resident(slug) && !missing.contains(&slug) {
                missing.push(slug);
            }
        }
        if missing.is_empty() {
            return Ok(self.resident());
        }

        let mut fetched = Vec::with_capacity(missing.len());
        for slug in missing {
            let entry = self
                .catalog
                .get(slug)
                .ok_or_else(|| StoreError::UnknownText(slug.clone()))?;
            let path = entry.index_path();

            trace.note(format!("Fetching index for {slug} from {path}"));
            tracing::info!(slug = %slug, path = %path, "fetching index document");
            let bytes = self.source.fetch(&path).await?;
            let collection = DocumentCollection::from_json(slug.as_str(), &bytes)
                .map_err(|source| StoreError::Malformed {
                    path: path.clone(),
                    source,
                })?;

            trace.log(
                format!("Fetched data for {slug}"),
                &json!({ "length": collection.len(), "sample": collection.first() }),
            );
            fetched.push((slug.clone(), Arc::new(collection)));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        for (slug, collection) in fetched {
            cache.entry(slug).or_insert(collection);
        }
        Ok(cache.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TextEntry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGES: &str = r#"[
        {"id": "1", "title": "Page 1", "text": "the great error of Ptolemy", "page": "1",
         "page_id_string": "page_001", "project": "CCAG_1"}
    ]"#;

    /// Serves fixed documents and counts fetches
    struct StaticSource {
        documents: HashMap<String, String>,
        fetches: AtomicUsize,
    }

    impl StaticSource {
        fn new(documents: &[(&str, &str)]) -> Self {
            Self {
                documents: documents
                    .iter()
                    .map(|(path, body)| (path.to_string(), body.to_string()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IndexSource for StaticSource {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.documents
                .get(path)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| StoreError::Io {
                    path: path.to_string(),
                    source: std::io::ErrorKind::NotFound.into(),
                })
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            TextEntry::new("CCAG_1", "CCAG 1"),
            TextEntry::new("CCAG_2", "CCAG 2"),
        ]))
    }

    fn slugs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_second_load_is_a_cache_hit() {
        let source = Arc::new(StaticSource::new(&[("/texts_indices/CCAG_1.json", PAGES)]));
        let store = IndexStore::new(source.clone(), catalog());
        let mut trace = DebugLog::new();

        let loaded = store.ensure_loaded(&slugs(&["CCAG_1"]), &mut trace).await.unwrap();
        assert_eq!(loaded["CCAG_1"].len(), 1);
        assert!(trace.contains("Fetching index for CCAG_1 from /texts_indices/CCAG_1.json"));
        assert!(trace.contains("Fetched data for CCAG_1"));

        store.ensure_loaded(&slugs(&["CCAG_1"]), &mut trace).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_commits_nothing() {
        let source = Arc::new(StaticSource::new(&[("/texts_indices/CCAG_1.json", PAGES)]));
        let store = IndexStore::new(source, catalog());
        let mut trace = DebugLog::new();

        let err = store
            .ensure_loaded(&slugs(&["CCAG_1", "CCAG_2"]), &mut trace)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.resident().is_empty());

        let err = store.ensure_loaded(&slugs(&["NOPE"]), &mut trace).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownText(slug) if slug == "NOPE"));
    }

    #[tokio::test]
    async fn test_cached_texts_survive_a_failed_load() {
        let source = Arc::new(StaticSource::new(&[
            ("/texts_indices/CCAG_1.json", PAGES),
            ("/texts_indices/CCAG_2.json", "{not json"),
        ]));
        let store = IndexStore::new(source, catalog());
        let mut trace = DebugLog::new();

        store.ensure_loaded(&slugs(&["CCAG_1"]), &mut trace).await.unwrap();
        let err = store
            .ensure_loaded(&slugs(&["CCAG_1", "CCAG_2"]), &mut trace)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
        assert!(store.is_resident("CCAG_1"));
        assert!(!store.is_resident("CCAG_2"));
    }

    #[tokio::test]
    async fn test_http_source_fetches_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/texts_indices/CCAG_1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGES))
            .expect(1)
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let store = IndexStore::new(Arc::new(HttpSource::new(base).unwrap()), catalog());
        let mut trace = DebugLog::new();

        store.ensure_loaded(&slugs(&["CCAG_1"]), &mut trace).await.unwrap();
        store.ensure_loaded(&slugs(&["CCAG_1"]), &mut trace).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_source_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let source = HttpSource::new(base).unwrap();
        let err = source.fetch("/texts_indices/CCAG_1.json").await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status, .. } if status.as_u16() == 404));
        assert_eq!(
            err.to_string(),
            "Failed to fetch /texts_indices/CCAG_1.json (404 Not Found)"
        );
    }

    #[tokio::test]
    async fn test_dir_source() -> anyhow::Result<()> {
        let site = tempfile::tempdir()?;
        std::fs::create_dir(site.path().join("texts_indices"))?;
        std::fs::write(site.path().join("texts_indices/CCAG_1.json"), PAGES)?;

        let source = DirSource::new(site.path());
        let bytes = source.fetch("/texts_indices/CCAG_1.json").await?;
        assert_eq!(bytes, PAGES.as_bytes());

        assert!(matches!(
            source.fetch("/../secret.json").await,
            Err(StoreError::OutsideRoot(_))
        ));
        assert!(matches!(
            source.fetch("/texts_indices/CCAG_9.json").await,
            Err(StoreError::Io { .. })
        ));
        Ok(())
    }
}
