//! Deterministic fakes for the three collaborator capabilities.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::analysis::invoker::RetryPolicy;
use crate::analysis::models::{ExtractedSkill, SkillCategory};
use crate::analysis::skill_matcher::SkillExtractor;
use crate::analysis::structured::{StructuredCallError, StructuredCaller};
use crate::index::{Corpus, IndexError, ScoredPassage, VectorIndex};
use crate::llm_client::{CallError, CallErrorKind, SchemaDescriptor, StructuredGenerator};

type Responder = Arc<dyn Fn(&str) -> Result<Value, CallError> + Send + Sync>;

/// Short backoff, generous per-attempt timeout so deadlines under test are the
/// coordinator's, not the invoker's.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        attempt_timeout: Duration::from_secs(600),
    }
}

/// Structured generator scripted per schema name. One-shot results queued with `push`
/// are consumed first; then the standing responder answers. Unscripted schemas fail
/// with `Invalid`.
#[derive(Default)]
pub struct ScriptedGenerator {
    queued: Mutex<HashMap<&'static str, VecDeque<Result<Value, CallError>>>>,
    responders: Mutex<HashMap<&'static str, Responder>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    prompts: Mutex<Vec<(&'static str, String)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, schema: &'static str, value: Value) {
        self.respond_with(schema, move |_| Ok(value.clone()));
    }

    pub fn respond_with(
        &self,
        schema: &'static str,
        responder: impl Fn(&str) -> Result<Value, CallError> + Send + Sync + 'static,
    ) {
        self.responders
            .lock()
            .unwrap()
            .insert(schema, Arc::new(responder));
    }

    pub fn fail(&self, schema: &'static str, kind: CallErrorKind) {
        self.respond_with(schema, move |_| {
            Err(CallError::new(kind, format!("scripted {kind:?}")))
        });
    }

    pub fn push(&self, schema: &'static str, result: Result<Value, CallError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(schema)
            .or_default()
            .push_back(result);
    }

    pub fn delay(&self, schema: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(schema, delay);
    }

    pub fn total_calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn calls_for(&self, schema: &str) -> usize {
        self.prompts_for(schema).len()
    }

    pub fn prompts_for(&self, schema: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == schema)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    fn next_result(&self, schema: &'static str, prompt: &str) -> Result<Value, CallError> {
        if let Some(result) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(schema)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        let responder = self.responders.lock().unwrap().get(schema).cloned();
        match responder {
            Some(responder) => responder(prompt),
            None => Err(CallError::new(
                CallErrorKind::Invalid,
                format!("no script for schema '{schema}'"),
            )),
        }
    }
}

#[async_trait]
impl StructuredGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, schema: &SchemaDescriptor) -> Result<Value, CallError> {
        self.prompts
            .lock()
            .unwrap()
            .push((schema.name, prompt.to_string()));
        let delay = self.delays.lock().unwrap().get(schema.name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_result(schema.name, prompt)
    }
}

/// Vector index with a fixed best passage and score per (lowercased) term.
/// Unknown terms return no passages.
#[derive(Default)]
pub struct FakeIndex {
    hits: Mutex<HashMap<String, ScoredPassage>>,
    delays: Mutex<HashMap<String, Duration>>,
    unavailable: Mutex<bool>,
    calls: AtomicUsize,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self, term: &str, passage: &str, score: f32) {
        self.hits.lock().unwrap().insert(
            term.to_lowercase(),
            ScoredPassage {
                passage: passage.to_string(),
                score,
            },
        );
    }

    pub fn delay(&self, term: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(term.to_lowercase(), delay);
    }

    pub fn set_unavailable(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for FakeIndex {
    async fn query(
        &self,
        term: &str,
        _corpus: &Corpus,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = term.to_lowercase();
        let delay = self.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.unavailable.lock().unwrap() {
            return Err(IndexError::Unavailable("index offline".to_string()));
        }
        let mut hits: Vec<ScoredPassage> =
            self.hits.lock().unwrap().get(&key).cloned().into_iter().collect();
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Skill extractor returning a fixed list, counting calls.
pub struct FixedExtractor {
    skills: Vec<ExtractedSkill>,
    calls: AtomicUsize,
}

impl FixedExtractor {
    pub fn hard(names: &[&str]) -> Self {
        Self {
            skills: names
                .iter()
                .map(|n| ExtractedSkill {
                    name: n.to_string(),
                    category: SkillCategory::Hard,
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SkillExtractor for FixedExtractor {
    async fn extract_skills(
        &self,
        _job_description: &str,
        _calls: &StructuredCaller,
    ) -> Result<Vec<ExtractedSkill>, StructuredCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.skills.clone())
    }
}
