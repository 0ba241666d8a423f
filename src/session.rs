use crate::engine::{search_texts, SearchResult};
use crate::error::SubmitError;
use crate::highlight::{excerpts_for, Excerpt};
use crate::store::IndexStore;
use crate::trace::DebugLog;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// URL parameter carrying the search term
pub const QUERY_PARAM: &str = "q";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Idle,
    Loading,
    Results,
    Failed,
}

/// State of one visit to the search page.
///
/// Created when the page is entered and dropped when the visitor leaves.
/// Loaded collections live in the shared [`IndexStore`].
pub struct SearchSession {
    store: Arc<IndexStore>,
    url: Url,
    query: String,
    last_search_term: String,
    selected: Vec<String>,
    results: Vec<SearchResult>,
    status: SearchStatus,
    error: Option<String>,
    trace: DebugLog,
    did_auto_search: bool,
}

impl SearchSession {
    /// Enter the search page at `url`. A `q` parameter pre-fills the query.
    pub fn new(store: Arc<IndexStore>, url: Url) -> Self {
        let selected = store
            .catalog()
            .default_text()
            .map(|text| vec![text.slug.clone()])
            .unwrap_or_default();
        let mut session = Self {
            store,
            url,
            query: String::new(),
            last_search_term: String::new(),
            selected,
            results: Vec::new(),
            status: SearchStatus::Idle,
            error: None,
            trace: DebugLog::new(),
            did_auto_search: false,
        };
        if let Some(q) = query_param(&session.url) {
            if !q.is_empty() && session.query.is_empty() {
                session.query = q;
            }
        }
        session
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Update the live query input. Rendered highlights are unaffected
    /// until the next submission.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// The term the current results were searched for
    pub fn last_search_term(&self) -> &str {
        &self.last_search_term
    }

    pub fn selected_texts(&self) -> &[String] {
        &self.selected
    }

    /// Add a text to the selection, or remove it if already selected
    pub fn toggle_text(&mut self, slug: &str) {
        match self.selected.iter().position(|s| s == slug) {
            Some(at) => {
                self.selected.remove(at);
            }
            None => self.selected.push(slug.to_string()),
        }
    }

    pub fn select_texts<I, S>(&mut self, slugs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected.clear();
        for slug in slugs {
            let slug = slug.into();
            if !self.selected.contains(&slug) {
                self.selected.push(slug);
            }
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == SearchStatus::Loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn trace(&self) -> &DebugLog {
        &self.trace
    }

    /// Whether the search button is enabled
    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.query.is_empty() && !self.selected.is_empty()
    }

    /// Run the current query over the selected texts
    pub async fn submit(&mut self) -> Result<(), SubmitError> {
        if self.selected.is_empty() {
            return Err(SubmitError::NoTextsSelected);
        }

        set_query_param(&mut self.url, &self.query);
        self.results.clear();
        self.error = None;
        self.trace.clear();
        self.last_search_term = self.query.clone();
        self.status = SearchStatus::Loading;

        let collections = match self.store.ensure_loaded(&self.selected, &mut self.trace).await {
            Ok(collections) => collections,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load index documents");
                self.trace.log("Error fetching indices", &err.to_string());
                self.error = Some(err.to_string());
                self.store.resident()
            }
        };

        self.trace.log(
            "Starting search",
            &json!({ "selectedTexts": self.selected, "query": self.query }),
        );
        self.results = search_texts(&self.selected, &collections, &self.query, &mut self.trace);
        self.status = if self.error.is_some() {
            SearchStatus::Failed
        } else {
            SearchStatus::Results
        };
        Ok(())
    }

    /// Submit once for a query that arrived in the page URL.
    ///
    /// Returns whether a search was started; later calls never search again.
    pub async fn auto_search(&mut self) -> Result<bool, SubmitError> {
        if self.did_auto_search {
            return Ok(false);
        }
        match query_param(&self.url) {
            Some(q) if !q.is_empty() && q == self.query => {}
            _ => return Ok(false),
        }
        self.did_auto_search = true;
        self.submit().await?;
        Ok(true)
    }

    /// Display excerpts of a result for the last submitted term
    pub fn excerpts(&self, result: &SearchResult) -> Vec<Excerpt> {
        excerpts_for(result.text(), &self.last_search_term)
    }
}

/// Current value of the `q` parameter
pub fn query_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Replace the `q` parameter in place, or drop it for an empty query.
/// Other parameters keep their order.
pub fn set_query_param(url: &mut Url, query: &str) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let position = pairs.iter().position(|(key, _)| key == QUERY_PARAM);
    pairs.retain(|(key, _)| key != QUERY_PARAM);
    if !query.is_empty() {
        let at = position.unwrap_or(pairs.len());
        pairs.insert(at, (QUERY_PARAM.to_string(), query.to_string()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, TextEntry};
    use crate::store::{DirSource, HttpSource};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CCAG_1: &str = r#"[
        {"id": "1", "title": "Page 1", "text": "...the great error of Ptolemy...", "page": "1",
         "page_id_string": "page_001", "project": "CCAG_1"},
        {"id": "2", "title": "Page 2", "text": "Saturn in the seventh house", "page": "2",
         "page_id_string": "page_002", "project": "CCAG_1"}
    ]"#;

    const CCAG_2: &str = r#"[
        {"id": "1", "title": "Folio 1", "text": "error error error, the errors of the scribes",
         "page": "1", "page_name": "1r", "page_id_string": "page_001", "project": "CCAG_2"}
    ]"#;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            TextEntry::new("CCAG_1", "CCAG 1"),
            TextEntry::new("CCAG_2", "CCAG 2"),
        ]))
    }

    fn site(documents: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("texts_indices")).unwrap();
        for (slug, body) in documents {
            let file = Path::new("texts_indices").join(format!("{slug}.json"));
            std::fs::write(dir.path().join(file), body).unwrap();
        }
        dir
    }

    fn session_at(site: &tempfile::TempDir, url: &str) -> SearchSession {
        let store = IndexStore::new(Arc::new(DirSource::new(site.path())), catalog());
        SearchSession::new(Arc::new(store), Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_submit_reflects_query_in_url() {
        let site = site(&[("CCAG_1", CCAG_1)]);
        let mut session = session_at(&site, "https://example.org/search?lang=en");
        assert_eq!(session.status(), SearchStatus::Idle);

        session.set_query("great error");
        session.submit().await.unwrap();
        assert_eq!(
            session.url().as_str(),
            "https://example.org/search?lang=en&q=great+error"
        );
        assert_eq!(query_param(session.url()).as_deref(), Some("great error"));
        assert_eq!(session.status(), SearchStatus::Results);
        assert_eq!(session.results()[0].reference, "1");

        session.set_query("");
        session.submit().await.unwrap();
        assert_eq!(session.url().as_str(), "https://example.org/search?lang=en");
        assert!(session.results().is_empty());
    }

    #[tokio::test]
    async fn test_highlights_follow_submitted_term() {
        let site = site(&[("CCAG_1", CCAG_1)]);
        let mut session = session_at(&site, "https://example.org/search");
        session.set_query("error");
        session.submit().await.unwrap();

        session.set_query("saturn");
        assert_eq!(session.last_search_term(), "error");

        let result = &session.results()[0];
        let excerpts = session.excerpts(result);
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].marked("[", "]"), "...the great [error] of Ptolemy...");
    }

    #[tokio::test]
    async fn test_results_merge_across_texts() {
        let site = site(&[("CCAG_1", CCAG_1), ("CCAG_2", CCAG_2)]);
        let mut session = session_at(&site, "https://example.org/search");
        session.toggle_text("CCAG_2");
        assert_eq!(session.selected_texts(), &["CCAG_1".to_string(), "CCAG_2".to_string()]);

        session.set_query("error");
        session.submit().await.unwrap();

        let results = session.results();
        assert_eq!(results.len(), 2);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        let slugs: Vec<&str> = results.iter().map(|r| r.slug.as_str()).collect();
        assert!(slugs.contains(&"CCAG_1") && slugs.contains(&"CCAG_2"));

        let scribes = results.iter().find(|r| r.slug == "CCAG_2").unwrap();
        assert_eq!(scribes.record.as_ref().unwrap().display_page(), "1r");
        assert_eq!(session.excerpts(scribes).len(), 4);
        assert!(session.trace().contains("Final sorted results"));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_cached_texts() {
        let site = site(&[("CCAG_1", CCAG_1)]);
        let mut session = session_at(&site, "https://example.org/search");
        session.set_query("error");
        session.submit().await.unwrap();

        session.toggle_text("CCAG_2");
        session.submit().await.unwrap();
        assert_eq!(session.status(), SearchStatus::Failed);
        assert!(session.error().unwrap().contains("/texts_indices/CCAG_2.json"));
        assert!(session.trace().contains("Error fetching indices"));
        assert!(session.trace().contains("No entries loaded for CCAG_2"));
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.results()[0].slug, "CCAG_1");
    }

    #[tokio::test]
    async fn test_submit_requires_a_selected_text() {
        let site = site(&[("CCAG_1", CCAG_1)]);
        let mut session = session_at(&site, "https://example.org/search");
        session.set_query("error");
        assert!(session.can_submit());

        session.toggle_text("CCAG_1");
        assert!(!session.can_submit());
        assert_eq!(session.submit().await, Err(SubmitError::NoTextsSelected));
        assert_eq!(session.status(), SearchStatus::Idle);
        assert_eq!(session.url().query(), None);
    }

    #[tokio::test]
    async fn test_query_in_url_searches_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/texts_indices/CCAG_1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CCAG_1))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpSource::new(Url::parse(&server.uri()).unwrap()).unwrap();
        let store = Arc::new(IndexStore::new(Arc::new(source), catalog()));
        let url = Url::parse("https://example.org/search?q=error").unwrap();
        let mut session = SearchSession::new(store, url);
        assert_eq!(session.query(), "error");

        assert!(session.auto_search().await.unwrap());
        assert!(!session.auto_search().await.unwrap());
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.url().as_str(), "https://example.org/search?q=error");
    }

    #[tokio::test]
    async fn test_no_auto_search_without_query_param() {
        let site = site(&[("CCAG_1", CCAG_1)]);
        let mut session = session_at(&site, "https://example.org/search");
        assert!(!session.auto_search().await.unwrap());
        assert_eq!(session.status(), SearchStatus::Idle);
    }

    #[test]
    fn test_set_query_param_replaces_in_place() {
        let mut url = Url::parse("https://example.org/search?a=1&q=old&b=2&q=dup").unwrap();
        set_query_param(&mut url, "new term");
        assert_eq!(url.as_str(), "https://example.org/search?a=1&q=new+term&b=2");

        let mut url = Url::parse("https://example.org/search?q=old").unwrap();
        set_query_param(&mut url, "");
        assert_eq!(url.as_str(), "https://example.org/search");
    }
}
