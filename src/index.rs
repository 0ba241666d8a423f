use crate::document::{DocStats, DocumentCollection, Field};
use crate::error::QueryError;
use crate::query::{wildcard_match, Clause, Presence, Query};
use crate::ranking::{rank_documents, ScoredDocument, BM25};
use crate::tokenizer::Tokenizer;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone)]
struct Posting {
    doc: usize,
    field: Field,
    tf: usize,
}

/// A document matched by a query
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    #[serde(rename = "ref")]
    pub reference: String,
    pub score: f64,
    /// Index term -> fields it was found in
    pub matched_terms: BTreeMap<String, BTreeSet<Field>>,
}

/// Inverted index over the title, text and page fields of one collection.
///
/// Built fresh for every search and dropped afterwards.
pub struct SearchIndex {
    refs: Vec<String>,
    duplicate_refs: Vec<String>,
    postings: HashMap<String, Vec<Posting>>,
    doc_stats: Vec<DocStats>,
    avg_lengths: [f64; 3],
    tokenizer: Tokenizer,
    ranking: BM25,
}

impl SearchIndex {
    /// Index every record of a collection, keyed by `id`.
    ///
    /// A repeated `id` is folded into the first record carrying it: its terms
    /// and field lengths add to that document, so the ref still matches.
    pub fn build(collection: &DocumentCollection) -> Self {
        let tokenizer = Tokenizer::new();
        let mut refs: Vec<String> = Vec::with_capacity(collection.len());
        let mut slots: HashMap<&str, usize> = HashMap::with_capacity(collection.len());
        let mut duplicate_refs = Vec::new();
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_stats: Vec<DocStats> = Vec::with_capacity(collection.len());
        let mut total_lengths = [0usize; 3];

        for record in collection.records() {
            let (doc, repeated) = match slots.get(record.id.as_str()).copied() {
                Some(doc) => {
                    if !duplicate_refs.contains(&record.id) {
                        duplicate_refs.push(record.id.clone());
                    }
                    (doc, true)
                }
                None => {
                    let doc = refs.len();
                    slots.insert(record.id.as_str(), doc);
                    refs.push(record.id.clone());
                    doc_stats.push(DocStats::default());
                    (doc, false)
                }
            };

            for field in Field::ALL {
                let (length, frequencies) = tokenizer.analyze_with_frequencies(record.field(field));
                doc_stats[doc].lengths[field.position()] += length;
                total_lengths[field.position()] += length;

                for (term, tf) in frequencies {
                    let term_postings = postings.entry(term).or_default();
                    let existing = if repeated {
                        term_postings
                            .iter_mut()
                            .find(|p| p.doc == doc && p.field == field)
                    } else {
                        None
                    };
                    match existing {
                        Some(posting) => posting.tf += tf,
                        None => term_postings.push(Posting { doc, field, tf }),
                    }
                }
            }
        }

        let avg_lengths = total_lengths.map(|total| {
            if refs.is_empty() {
                0.0
            } else {
                total as f64 / refs.len() as f64
            }
        });

        Self {
            refs,
            duplicate_refs,
            postings,
            doc_stats,
            avg_lengths,
            tokenizer,
            ranking: BM25::default(),
        }
    }

    /// Ids that appeared on more than one record, in first-repeat order
    pub fn duplicate_refs(&self) -> &[String] {
        &self.duplicate_refs
    }

    /// Parse `query` and run it
    pub fn search(&self, query: &str) -> Result<Vec<Match>, QueryError> {
        let query = Query::parse(query, &self.tokenizer)?;
        Ok(self.query(&query))
    }

    /// Run a parsed query, best match first
    pub fn query(&self, query: &Query) -> Vec<Match> {
        if query.is_empty() {
            return Vec::new();
        }

        let total_docs = self.total_documents();
        let mut scores: HashMap<usize, f64> = HashMap::new();
        let mut matched: HashMap<usize, BTreeMap<String, BTreeSet<Field>>> = HashMap::new();
        let mut required: Option<HashSet<usize>> = None;
        let mut prohibited: HashSet<usize> = HashSet::new();
        let mut has_positive = false;

        for clause in &query.clauses {
            let fields = clause.fields();
            let mut clause_docs = HashSet::new();

            for term in self.expand(clause) {
                let Some(term_postings) = self.postings.get(term) else {
                    continue;
                };
                let idf = self.ranking.idf(self.doc_frequency(term), total_docs);

                for posting in term_postings.iter().filter(|p| fields.contains(&p.field)) {
                    clause_docs.insert(posting.doc);
                    if clause.presence == Presence::Prohibited {
                        continue;
                    }

                    let score = self.ranking.score(
                        posting.tf,
                        idf,
                        self.doc_stats[posting.doc].length(posting.field),
                        self.avg_lengths[posting.field.position()],
                    );
                    *scores.entry(posting.doc).or_insert(0.0) += clause.boost * score;
                    matched
                        .entry(posting.doc)
                        .or_default()
                        .entry(term.clone())
                        .or_default()
                        .insert(posting.field);
                }
            }

            match clause.presence {
                Presence::Prohibited => prohibited.extend(clause_docs),
                Presence::Required => {
                    has_positive = true;
                    required = Some(match required {
                        None => clause_docs,
                        Some(docs) => docs.intersection(&clause_docs).copied().collect(),
                    });
                }
                Presence::Optional => has_positive = true,
            }
        }

        let candidates: Vec<usize> = if !has_positive {
            // only exclusions: everything else matches
            (0..total_docs).collect()
        } else if let Some(required) = required {
            required.into_iter().collect()
        } else {
            scores.keys().copied().collect()
        };

        let scored = candidates
            .into_iter()
            .filter(|doc| !prohibited.contains(doc))
            .map(|doc| ScoredDocument::new(doc, scores.get(&doc).copied().unwrap_or(0.0)))
            .collect();

        rank_documents(scored)
            .into_iter()
            .map(|scored| Match {
                reference: self.refs[scored.doc].clone(),
                score: scored.score,
                matched_terms: matched.remove(&scored.doc).unwrap_or_default(),
            })
            .collect()
    }

    /// Index terms a clause refers to
    fn expand<'a>(&'a self, clause: &'a Clause) -> Vec<&'a String> {
        if clause.wildcard {
            self.postings
                .keys()
                .filter(|term| wildcard_match(&clause.term, term))
                .collect()
        } else if clause.edit_distance > 0 {
            let distance = clause.edit_distance as usize;
            self.postings
                .keys()
                .filter(|term| strsim::levenshtein(&clause.term, term) <= distance)
                .collect()
        } else {
            self.postings
                .get_key_value(&clause.term)
                .map(|(term, _)| term)
                .into_iter()
                .collect()
        }
    }

    /// Number of documents containing a term in any field (for IDF calculation)
    pub fn doc_frequency(&self, term: &str) -> usize {
        self.postings
            .get(term)
            .map(|postings| postings.iter().map(|p| p.doc).collect::<HashSet<_>>().len())
            .unwrap_or(0)
    }

    /// Total number of indexed documents
    pub fn total_documents(&self) -> usize {
        self.refs.len()
    }

    /// All terms in the index
    pub fn all_terms(&self) -> Vec<&String> {
        self.postings.keys().collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.refs.len(),
            total_terms: self.postings.len(),
            avg_postings_per_term: if self.postings.is_empty() {
                0.0
            } else {
                self.postings.values().map(Vec::len).sum::<usize>() as f64
                    / self.postings.len() as f64
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_terms: usize,
    pub avg_postings_per_term: f64,
}
