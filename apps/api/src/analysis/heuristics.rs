//! Heuristic Evaluator: recruiter checklist, red flags and style critique.
//!
//! Three independent structured calls run concurrently. Each is retried, validated and
//! repaired on its own, so a failed style critique never costs the checklist. A failed
//! or late slice falls back to its safe default and is recorded as a `Degradation`:
//! - checklist → every criterion `false`
//! - red flags / style critiques → empty
//!
//! The evaluator never fails the analysis.

use serde::Deserialize;
use tokio::time::{timeout_at, Instant};
use tracing::info;

use crate::analysis::models::{
    AnalysisRequest, Checklist, Component, Criterion, Degradation, RedFlag, StyleCritique,
};
use crate::analysis::prompts::{
    excerpt, fill_template, CHECKLIST_PROMPT, CHECKLIST_SCHEMA, MAX_JD_PROMPT_CHARS,
    MAX_RESUME_PROMPT_CHARS, RED_FLAGS_PROMPT, RED_FLAGS_SCHEMA, STYLE_PROMPT, STYLE_SCHEMA,
};
use crate::analysis::structured::{clean_strings, settle, SchemaCheck, StructuredCaller};
use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;

/// Model verdicts for the seven-point tick list. Every key is required and must be a
/// JSON boolean; anything else is a schema violation.
#[derive(Debug, Deserialize)]
struct ChecklistResponse {
    job_title_match: bool,
    industry_match: bool,
    product_knowledge: bool,
    specialist_technical: bool,
    relevant_qualifications: bool,
    ability_to_add_value: bool,
    years_experience_visible: bool,
}

impl SchemaCheck for ChecklistResponse {}

impl ChecklistResponse {
    fn into_checklist(self) -> Checklist {
        let (checklist, _) = Checklist::from_partial([
            (Criterion::JobTitleMatch, self.job_title_match),
            (Criterion::IndustryMatch, self.industry_match),
            (Criterion::ProductKnowledge, self.product_knowledge),
            (Criterion::SpecialistTechnical, self.specialist_technical),
            (Criterion::RelevantQualifications, self.relevant_qualifications),
            (Criterion::AbilityToAddValue, self.ability_to_add_value),
            (Criterion::YearsExperience, self.years_experience_visible),
        ]);
        checklist
    }
}

#[derive(Debug, Deserialize)]
struct RedFlagsResponse {
    red_flags: Vec<String>,
}

impl SchemaCheck for RedFlagsResponse {}

#[derive(Debug, Deserialize)]
struct StyleResponse {
    style_critiques: Vec<String>,
}

impl SchemaCheck for StyleResponse {}

/// Evaluator output. `degradations` names every slice that fell back to its default.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicEvaluation {
    pub checklist: Checklist,
    pub red_flags: Vec<RedFlag>,
    pub style_critiques: Vec<StyleCritique>,
    pub degradations: Vec<Degradation>,
}

impl HeuristicEvaluation {
    pub fn degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    /// Runs all sub-calls, each bounded by `deadline`.
    pub async fn evaluate(
        &self,
        request: &AnalysisRequest,
        calls: &StructuredCaller,
        deadline: Instant,
    ) -> HeuristicEvaluation {
        let resume_text = excerpt(&request.resume_text, MAX_RESUME_PROMPT_CHARS);
        let job_description = excerpt(&request.job_description, MAX_JD_PROMPT_CHARS);
        let filename = request
            .metadata
            .filename
            .as_deref()
            .unwrap_or("Unknown");

        let page_count = request
            .metadata
            .page_count
            .map(|pages| pages.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let checklist_prompt = fill_template(
            CHECKLIST_PROMPT,
            &[
                ("evidence_instruction", EVIDENCE_INSTRUCTION),
                ("resume_text", resume_text.as_str()),
                ("job_description", job_description.as_str()),
            ],
        );
        let red_flags_prompt = fill_template(
            RED_FLAGS_PROMPT,
            &[
                ("evidence_instruction", EVIDENCE_INSTRUCTION),
                ("filename", filename),
                ("page_count", page_count.as_str()),
                ("resume_text", resume_text.as_str()),
            ],
        );
        let style_prompt = fill_template(
            STYLE_PROMPT,
            &[
                ("evidence_instruction", EVIDENCE_INSTRUCTION),
                ("resume_text", resume_text.as_str()),
            ],
        );

        let (checklist, red_flags, style) = tokio::join!(
            timeout_at(
                deadline,
                calls.call::<ChecklistResponse>(&checklist_prompt, &CHECKLIST_SCHEMA)
            ),
            timeout_at(
                deadline,
                calls.call::<RedFlagsResponse>(&red_flags_prompt, &RED_FLAGS_SCHEMA)
            ),
            timeout_at(
                deadline,
                calls.call::<StyleResponse>(&style_prompt, &STYLE_SCHEMA)
            ),
        );

        let mut degradations = Vec::new();
        let checklist = settle(Component::Checklist, checklist, &mut degradations)
            .map(ChecklistResponse::into_checklist)
            .unwrap_or_default();
        let red_flags = settle(Component::RedFlags, red_flags, &mut degradations)
            .map(|r| clean_strings(r.red_flags))
            .unwrap_or_default();
        let style_critiques = settle(Component::StyleCritique, style, &mut degradations)
            .map(|r| clean_strings(r.style_critiques))
            .unwrap_or_default();

        info!(
            "Heuristics: {}/{} checklist passed, {} red flags, {} style critiques, {} degraded",
            checklist.passed_count(),
            checklist.len(),
            red_flags.len(),
            style_critiques.len(),
            degradations.len()
        );

        HeuristicEvaluation {
            checklist,
            red_flags,
            style_critiques,
            degradations,
        }
    }
}
