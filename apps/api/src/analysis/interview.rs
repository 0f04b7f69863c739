//! Interview Prep Generator: candidate-specific questions aimed at unmatched skills.

use serde::Deserialize;
use tracing::info;

use crate::analysis::models::{AnalysisRequest, InterviewQuestion, SkillFinding};
use crate::analysis::prompts::{
    excerpt, fill_template, INTERVIEW_PROMPT, INTERVIEW_QUESTION_COUNT, INTERVIEW_SCHEMA,
    MAX_JD_PROMPT_CHARS, MAX_RESUME_PROMPT_CHARS,
};
use crate::analysis::structured::{
    clean_strings, SchemaCheck, StructuredCallError, StructuredCaller,
};

#[derive(Debug, Deserialize)]
struct InterviewResponse {
    questions: Vec<String>,
}

impl SchemaCheck for InterviewResponse {
    fn check(&self) -> Result<(), String> {
        if self.questions.iter().all(|q| q.trim().is_empty()) {
            return Err("questions must contain at least one non-empty question".to_string());
        }
        Ok(())
    }
}

pub struct InterviewPrepGenerator;

impl InterviewPrepGenerator {
    /// Generates up to `INTERVIEW_QUESTION_COUNT` questions. Unmatched skills are listed
    /// first in the prompt so the questions target the weakest areas.
    pub async fn generate(
        &self,
        request: &AnalysisRequest,
        findings: &[SkillFinding],
        calls: &StructuredCaller,
    ) -> Result<Vec<InterviewQuestion>, StructuredCallError> {
        let prompt = fill_template(
            INTERVIEW_PROMPT,
            &[
                ("count", INTERVIEW_QUESTION_COUNT.to_string().as_str()),
                ("missing_skills", skill_list(findings, false).as_str()),
                ("matched_skills", skill_list(findings, true).as_str()),
                (
                    "resume_text",
                    excerpt(&request.resume_text, MAX_RESUME_PROMPT_CHARS).as_str(),
                ),
                (
                    "job_description",
                    excerpt(&request.job_description, MAX_JD_PROMPT_CHARS).as_str(),
                ),
            ],
        );

        let response: InterviewResponse = calls.call(&prompt, &INTERVIEW_SCHEMA).await?;
        let mut questions = clean_strings(response.questions);
        questions.truncate(INTERVIEW_QUESTION_COUNT);

        info!("Interview prep: {} questions", questions.len());
        Ok(questions)
    }
}

fn skill_list(findings: &[SkillFinding], matched: bool) -> String {
    let names: Vec<&str> = findings
        .iter()
        .filter(|f| f.matched == matched)
        .map(|f| f.skill.as_str())
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
