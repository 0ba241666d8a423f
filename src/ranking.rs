use std::cmp::Ordering;

/// BM25 parameters
#[derive(Debug, Clone, Copy)]
pub struct BM25 {
    k1: f64,
    b: f64,
}

impl Default for BM25 {
    fn default() -> Self {
        Self {
            k1: 1.2,  // Term frequency saturation parameter
            b: 0.75, // Length normalization parameter
        }
    }
}

impl BM25 {
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    /// Inverse document frequency of a term found in `doc_freq` of `total_docs` documents
    pub fn idf(&self, doc_freq: usize, total_docs: usize) -> f64 {
        let doc_freq = doc_freq as f64;
        let total_docs = total_docs as f64;
        ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5)).abs().ln_1p()
    }

    /// Score of one term in one field of one document
    pub fn score(&self, tf: usize, idf: f64, field_length: usize, avg_field_length: f64) -> f64 {
        if tf == 0 {
            return 0.0;
        }
        let tf = tf as f64;
        let length_ratio = if avg_field_length > 0.0 {
            field_length as f64 / avg_field_length
        } else {
            1.0
        };

        idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * length_ratio))
    }
}

/// Ranked search result
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    /// Position of the document in its collection
    pub doc: usize,
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(doc: usize, score: f64) -> Self {
        Self { doc, score }
    }
}

/// Order by score descending; equal scores keep collection order
pub fn rank_documents(mut scored_docs: Vec<ScoredDocument>) -> Vec<ScoredDocument> {
    scored_docs.sort_by(|a, b| by_score_desc(a.score, b.score).then(a.doc.cmp(&b.doc)));
    scored_docs
}

/// Total descending order over scores, NaN last
pub fn by_score_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.total_cmp(&a),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bm25_score() {
        let bm25 = BM25::default();
        let idf = bm25.idf(1, 10);
        assert!(idf > 0.0);
        assert!(bm25.score(2, idf, 10, 10.0) > bm25.score(1, idf, 10, 10.0));
        assert!(bm25.score(1, idf, 5, 10.0) > bm25.score(1, idf, 20, 10.0));
        assert_eq!(bm25.score(0, idf, 10, 10.0), 0.0);
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let bm25 = BM25::default();
        assert!(bm25.idf(1, 100) > bm25.idf(50, 100));
        assert!(bm25.idf(100, 100) > 0.0);
    }

    #[test]
    fn test_rank_documents() {
        let ranked = rank_documents(vec![
            ScoredDocument::new(0, 0.5),
            ScoredDocument::new(1, 0.9),
            ScoredDocument::new(2, 0.5),
        ]);
        let order: Vec<usize> = ranked.iter().map(|d| d.doc).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_nan_sorts_last() {
        let mut scores = vec![f64::NAN, 0.1, 2.0];
        scores.sort_by(|a, b| by_score_desc(*a, *b));
        assert_eq!(scores[0], 2.0);
        assert_eq!(scores[1], 0.1);
        assert!(scores[2].is_nan());
    }
}
