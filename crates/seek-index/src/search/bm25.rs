//! BM25 keyword ranking over indexed chunks.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// BM25 parameters
const K1: f64 = 1.2; // Term frequency saturation
const B: f64 = 0.75; // Length normalization

/// A chunk of text in the BM25 index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedText {
    pub id: String,
    pub text: String,
    pub tokens: Vec<String>,
}

/// BM25 search index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BM25Index {
    /// All indexed chunks
    entries: HashMap<String, IndexedText>,
    /// Number of chunks containing each term
    doc_freq: HashMap<String, f64>,
    /// Sum of all chunk lengths (in tokens)
    total_length: usize,
}

impl BM25Index {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize text into terms
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Add a chunk, replacing any previous text stored under the same id
    pub fn add(&mut self, id: String, text: String) {
        self.remove(&id);

        let tokens = Self::tokenize(&text);
        self.total_length += tokens.len();

        let unique_terms: HashSet<_> = tokens.iter().collect();
        for term in unique_terms {
            *self.doc_freq.entry(term.clone()).or_insert(0.0) += 1.0;
        }

        self.entries.insert(id.clone(), IndexedText { id, text, tokens });
    }

    /// Remove a chunk
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };

        self.total_length -= entry.tokens.len();

        let unique_terms: HashSet<_> = entry.tokens.iter().collect();
        for term in unique_terms {
            if let Some(count) = self.doc_freq.get_mut(term) {
                *count -= 1.0;
                if *count <= 0.0 {
                    self.doc_freq.remove(term);
                }
            }
        }

        true
    }

    /// Stored text of a chunk
    pub fn text(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.text.as_str())
    }

    fn avg_length(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.entries.len() as f64
        }
    }

    /// Inverse document frequency for a term
    fn idf(&self, term: &str) -> f64 {
        let df = self.doc_freq.get(term).copied().unwrap_or(0.0);
        if df == 0.0 {
            return 0.0;
        }

        let n = self.entries.len() as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, entry: &IndexedText, query_terms: &[String], avg_length: f64) -> f64 {
        let length = entry.tokens.len() as f64;

        let mut term_freqs: HashMap<&str, usize> = HashMap::new();
        for token in &entry.tokens {
            *term_freqs.entry(token.as_str()).or_insert(0) += 1;
        }

        query_terms
            .iter()
            .map(|term| {
                let tf = term_freqs.get(term.as_str()).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * (length / avg_length));
                self.idf(term) * (numerator / denominator)
            })
            .sum()
    }

    /// Ranked `(id, score)` pairs with a positive score, best first.
    /// Ties are broken by id so results are deterministic.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let avg_length = self.avg_length();
        let mut scores: Vec<(String, f64)> = self
            .entries
            .values()
            .map(|entry| (entry.id.clone(), self.score(entry, &query_terms, avg_length)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(limit);
        scores
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = BM25Index::tokenize("Hello, World! This is a test_function.");
        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"test_function".to_string()));
        assert!(tokens.contains(&"a".to_string()));
        assert!(!tokens.iter().any(|t| t.is_empty()));
    }

    #[test]
    fn test_single_character_terms_match() {
        let mut index = BM25Index::new();
        index.add("1".to_string(), "x = 1".to_string());
        index.add("2".to_string(), "let total = 0".to_string());

        let results = index.search("x", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "1");
    }

    #[test]
    fn test_add_and_search() {
        let mut index = BM25Index::new();
        index.add("1".to_string(), "The quick brown fox".to_string());
        index.add("2".to_string(), "The lazy dog".to_string());
        index.add("3".to_string(), "The quick rabbit".to_string());

        let results = index.search("quick fox", 10);
        assert_eq!(results[0].0, "1");
        assert!(results.iter().all(|(id, _)| id != "2"));
    }

    #[test]
    fn test_re_adding_replaces() {
        let mut index = BM25Index::new();
        index.add("1".to_string(), "alpha beta".to_string());
        index.add("1".to_string(), "gamma delta".to_string());

        assert_eq!(index.len(), 1);
        assert!(index.search("alpha", 10).is_empty());
        assert_eq!(index.search("gamma", 10)[0].0, "1");
        assert_eq!(index.text("1"), Some("gamma delta"));
    }

    #[test]
    fn test_remove() {
        let mut index = BM25Index::new();
        index.add("1".to_string(), "Test document".to_string());
        assert!(index.remove("1"));
        assert!(!index.remove("1"));
        assert!(index.is_empty());
        assert!(index.search("test", 10).is_empty());
    }

    #[test]
    fn test_empty_query() {
        let mut index = BM25Index::new();
        index.add("1".to_string(), "content".to_string());
        assert!(index.search("", 10).is_empty());
        assert!(index.search(" , ", 10).is_empty());
    }

    #[test]
    fn test_limit() {
        let mut index = BM25Index::new();
        for i in 0..5 {
            index.add(i.to_string(), format!("shared term {}", i));
        }
        assert_eq!(index.search("shared", 3).len(), 3);
    }
}
