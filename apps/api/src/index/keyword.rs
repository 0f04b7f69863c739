//! Keyword index, the default `VectorIndex` backend.
//!
//! Pure-Rust, fast, deterministic, no embedding call. A passage's score is the
//! fraction of the term's tokens that appear in it:
//! - "Python" against "Experienced Python developer" → 1.0
//! - "machine learning" against "deep learning research" → 0.5

use std::collections::HashSet;

use async_trait::async_trait;

use crate::index::{Corpus, IndexError, ScoredPassage, VectorIndex};

pub struct KeywordIndex;

#[async_trait]
impl VectorIndex for KeywordIndex {
    async fn query(
        &self,
        term: &str,
        corpus: &Corpus,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        rank_passages(term, corpus, top_k)
    }
}

fn rank_passages(
    term: &str,
    corpus: &Corpus,
    top_k: usize,
) -> Result<Vec<ScoredPassage>, IndexError> {
    let term_tokens: HashSet<String> = tokenize(term).into_iter().collect();
    if term_tokens.is_empty() {
        return Err(IndexError::InvalidQuery(format!(
            "term '{term}' has no searchable tokens"
        )));
    }
    if corpus.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored: Vec<ScoredPassage> = corpus
        .passages()
        .iter()
        .map(|passage| {
            let passage_tokens: HashSet<String> = tokenize(passage).into_iter().collect();
            let hits = term_tokens
                .iter()
                .filter(|t| passage_tokens.contains(*t))
                .count();
            ScoredPassage {
                passage: passage.clone(),
                score: hits as f32 / term_tokens.len() as f32,
            }
        })
        .collect();

    // Stable sort: on ties the earlier passage wins.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    Ok(scored)
}

/// Lowercased tokens, split on anything that is not alphanumeric, `+`, `#` or `.`.
/// Leading/trailing dots are dropped so "SQL." matches "sql" but "Node.js" stays whole.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
