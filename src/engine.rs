use crate::document::{DocumentCollection, DocumentRecord, Field};
use crate::error::QueryError;
use crate::index::SearchIndex;
use crate::ranking::by_score_desc;
use crate::trace::DebugLog;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// A matched page, joined with its record
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(rename = "ref")]
    pub reference: String,
    pub slug: String,
    pub score: f64,
    /// `None` when the index matched an id the collection does not contain
    #[serde(flatten)]
    pub record: Option<DocumentRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub matched_terms: BTreeMap<String, BTreeSet<Field>>,
}

impl SearchResult {
    pub fn text(&self) -> Option<&str> {
        self.record.as_ref().map(|record| record.text.as_str())
    }
}

/// Run `query` against one text's index and join each match to its record
pub fn execute(
    index: &SearchIndex,
    collection: &DocumentCollection,
    query: &str,
    trace: &mut DebugLog,
) -> Result<Vec<SearchResult>, QueryError> {
    let slug = collection.slug();
    let matches = index.search(query)?;
    trace.log(format!("Search results for {slug}"), &matches);

    let results = matches
        .into_iter()
        .map(|m| {
            let record = collection.find(&m.reference).cloned();
            if record.is_none() {
                tracing::warn!(slug, reference = %m.reference, "matched id missing from collection");
                trace.note(format!("No entry found for ref {} in {slug}", m.reference));
            }
            SearchResult {
                reference: m.reference,
                slug: slug.to_string(),
                score: m.score,
                record,
                matched_terms: m.matched_terms,
            }
        })
        .collect();
    Ok(results)
}

/// Build an index per selected text, query each one and merge the results.
///
/// A text that is not loaded or rejects the query is logged and left
/// out; the remaining texts still contribute.
pub fn search_texts(
    selected: &[String],
    collections: &HashMap<String, Arc<DocumentCollection>>,
    query: &str,
    trace: &mut DebugLog,
) -> Vec<SearchResult> {
    let mut per_text = Vec::with_capacity(selected.len());

    for slug in selected {
        let Some(collection) = collections.get(slug) else {
            tracing::warn!(slug = %slug, "no entries loaded");
            trace.note(format!("No entries loaded for {slug}"));
            continue;
        };

        trace.log(
            format!("Building index for {slug}"),
            &json!({ "count": collection.len(), "sample": collection.first() }),
        );
        let index = SearchIndex::build(collection);
        if !index.duplicate_refs().is_empty() {
            tracing::warn!(slug = %slug, ids = ?index.duplicate_refs(), "repeated ids merged");
            trace.log(format!("Duplicate ids in {slug}"), index.duplicate_refs());
        }
        trace.log(format!("Index built for {slug}"), &index.stats());

        match execute(&index, collection, query, trace) {
            Ok(results) => {
                trace.log(format!("Mapped results for {slug}"), &results);
                per_text.push(results);
            }
            Err(err) => {
                tracing::warn!(slug = %slug, error = %err, "query failed");
                trace.log(format!("Error running search for {slug}"), &err.to_string());
            }
        }
    }

    let merged = merge_results(per_text);
    trace.log("Final sorted results", &merged);
    merged
}

/// Concatenate per-text results and order them by score, best first.
/// The sort is stable, so equal scores keep selection order.
pub fn merge_results<I>(per_text: I) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut merged: Vec<SearchResult> = per_text.into_iter().flatten().collect();
    merged.sort_by(|a, b| by_score_desc(a.score, b.score));
    merged
}
