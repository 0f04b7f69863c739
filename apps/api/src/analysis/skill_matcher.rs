//! Skill Matcher: verifies each job-description skill against resume passages.
//!
//! Flow: extract_skills → dedup (case-insensitive, first occurrence wins) →
//!       one vector query per skill, concurrently → classify by best score.
//!
//! This is the critical path of an analysis: `match_score` is derived from its output,
//! so any index failure fails the whole match rather than silently dropping a skill.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::invoker::{invoke, InvocationError};
use crate::analysis::models::{AnalysisRequest, ExtractedSkill, SkillCategory, SkillFinding};
use crate::analysis::prompts::{
    excerpt, fill_template, MAX_JD_PROMPT_CHARS, SKILL_EXTRACTION_PROMPT,
    SKILL_EXTRACTION_SCHEMA,
};
use crate::analysis::structured::{SchemaCheck, StructuredCallError, StructuredCaller};
use crate::index::corpus::DEFAULT_CHUNK_SIZE;
use crate::index::{Corpus, VectorIndex};
use crate::llm_client::CallError;

#[derive(Debug, Clone, Error)]
pub enum MatchError {
    #[error("skill extraction failed: {0}")]
    Extraction(#[from] StructuredCallError),

    #[error("vector query for '{skill}' failed: {source}")]
    Index {
        skill: String,
        source: InvocationError,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Skill extraction
// ────────────────────────────────────────────────────────────────────────────

/// Extracts the skills a job description asks for, in discovery order.
///
/// Receives the per-analysis `StructuredCaller` so model-backed extractors share the
/// request's call gate and retry policy.
#[async_trait]
pub trait SkillExtractor: Send + Sync {
    async fn extract_skills(
        &self,
        job_description: &str,
        calls: &StructuredCaller,
    ) -> Result<Vec<ExtractedSkill>, StructuredCallError>;
}

#[derive(Debug, Deserialize)]
struct ExtractedSkillsResponse {
    hard_skills: Vec<String>,
    #[serde(default)]
    soft_skills: Vec<String>,
}

impl SchemaCheck for ExtractedSkillsResponse {}

/// Default extractor: asks the model for hard and soft skills.
pub struct LlmSkillExtractor;

#[async_trait]
impl SkillExtractor for LlmSkillExtractor {
    async fn extract_skills(
        &self,
        job_description: &str,
        calls: &StructuredCaller,
    ) -> Result<Vec<ExtractedSkill>, StructuredCallError> {
        let prompt = fill_template(
            SKILL_EXTRACTION_PROMPT,
            &[(
                "job_description",
                excerpt(job_description, MAX_JD_PROMPT_CHARS).as_str(),
            )],
        );
        let response: ExtractedSkillsResponse =
            calls.call(&prompt, &SKILL_EXTRACTION_SCHEMA).await?;

        let hard = response.hard_skills.into_iter().map(|name| ExtractedSkill {
            name,
            category: SkillCategory::Hard,
        });
        let soft = response.soft_skills.into_iter().map(|name| ExtractedSkill {
            name,
            category: SkillCategory::Soft,
        });
        Ok(hard.chain(soft).collect())
    }
}

/// Trims names, drops ones with nothing searchable (blank, or punctuation only like
/// "-" or "..."), and removes case-insensitive duplicates keeping the first.
pub fn dedup_skills(skills: Vec<ExtractedSkill>) -> Vec<ExtractedSkill> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .filter_map(|skill| {
            let name = skill.name.trim().to_string();
            if !name.chars().any(char::is_alphanumeric) || !seen.insert(name.to_lowercase()) {
                return None;
            }
            Some(ExtractedSkill { name, ..skill })
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Matcher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MatcherSettings {
    /// A skill is matched when its best passage score is strictly above this.
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub chunk_size: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            top_k: 3,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct SkillMatcher {
    extractor: Arc<dyn SkillExtractor>,
    index: Arc<dyn VectorIndex>,
    settings: MatcherSettings,
}

impl SkillMatcher {
    pub fn new(
        extractor: Arc<dyn SkillExtractor>,
        index: Arc<dyn VectorIndex>,
        settings: MatcherSettings,
    ) -> Self {
        Self {
            extractor,
            index,
            settings,
        }
    }

    /// Produces one finding per unique extracted skill, in extraction order.
    pub async fn match_skills(
        &self,
        request: &AnalysisRequest,
        calls: &StructuredCaller,
    ) -> Result<Vec<SkillFinding>, MatchError> {
        let extracted = self
            .extractor
            .extract_skills(&request.job_description, calls)
            .await?;
        let skills = dedup_skills(extracted);
        info!("Extracted {} unique skills from job description", skills.len());

        if skills.is_empty() {
            return Ok(Vec::new());
        }

        let corpus = Corpus::from_resume(&request.resume_text, self.settings.chunk_size);
        let corpus = &corpus;

        // Completion order is arbitrary; each result lands in its extraction slot.
        let mut slots: Vec<Option<SkillFinding>> = vec![None; skills.len()];
        let mut pending: FuturesUnordered<_> = skills
            .iter()
            .enumerate()
            .map(|(position, skill)| async move {
                (position, self.verify_skill(skill, corpus, calls).await)
            })
            .collect();

        while let Some((position, finding)) = pending.next().await {
            slots[position] = Some(finding?);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn verify_skill(
        &self,
        skill: &ExtractedSkill,
        corpus: &Corpus,
        calls: &StructuredCaller,
    ) -> Result<SkillFinding, MatchError> {
        let label = format!("vector query '{}'", skill.name);
        let hits = invoke(&label, calls.policy(), calls.gate(), || async move {
            self.index
                .query(&skill.name, corpus, self.settings.top_k)
                .await
                .map_err(CallError::from)
        })
        .await
        .map_err(|source| MatchError::Index {
            skill: skill.name.clone(),
            source,
        })?;

        let best = hits.into_iter().max_by(|a, b| a.score.total_cmp(&b.score));

        let finding = match best {
            Some(hit) if hit.score > self.settings.similarity_threshold => SkillFinding {
                skill: skill.name.clone(),
                category: skill.category,
                evidence_or_recommendation: hit.passage,
                matched: true,
            },
            best => {
                debug!(
                    "'{}' unmatched (best score {:.2})",
                    skill.name,
                    best.map(|h| h.score).unwrap_or(0.0)
                );
                SkillFinding {
                    skill: skill.name.clone(),
                    category: skill.category,
                    evidence_or_recommendation: recommendation_for(skill),
                    matched: false,
                }
            }
        };
        Ok(finding)
    }
}

/// Static improvement advice for a skill the resume does not evidence.
fn recommendation_for(skill: &ExtractedSkill) -> String {
    match skill.category {
        SkillCategory::Hard => format!(
            "No clear evidence of {0}. Add a bullet showing where you used {0}, \
            with a concrete, quantified outcome.",
            skill.name
        ),
        SkillCategory::Soft => format!(
            "No clear evidence of {0}. Show {0} through a specific situation \
            and its measurable result.",
            skill.name
        ),
    }
}
