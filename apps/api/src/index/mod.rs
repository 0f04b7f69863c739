//! Vector index capability: similarity search of skill terms against resume passages.
//!
//! The analysis core only ever reads from an index. The coordinator is handed an
//! `Arc<dyn VectorIndex>` at startup, so a hosted embedding store can replace the
//! default `KeywordIndex` without touching the skill matcher.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::llm_client::{CallError, CallErrorKind};

pub mod corpus;
pub mod keyword;

pub use corpus::Corpus;
pub use keyword::KeywordIndex;

/// One resume passage returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPassage {
    pub passage: String,
    /// In [0.0, 1.0]; higher is more similar.
    pub score: f32,
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("vector index rejected query: {0}")]
    InvalidQuery(String),
}

impl From<IndexError> for CallError {
    fn from(e: IndexError) -> Self {
        let kind = match e {
            IndexError::Unavailable(_) => CallErrorKind::Overloaded,
            IndexError::InvalidQuery(_) => CallErrorKind::Invalid,
        };
        CallError::new(kind, e.to_string())
    }
}

/// Returns the `top_k` passages of `corpus` most similar to `term`, best first.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(
        &self,
        term: &str,
        corpus: &Corpus,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError>;
}
