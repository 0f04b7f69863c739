//! Analysis Coordinator: the single public entry point of the analysis core.
//!
//! State machine: `Received → Running → Completed | PartiallyCompleted | Failed`.
//!
//! ```text
//!            ┌─ skill match (skill_deadline) ─→ interview prep (deadline) ─┐
//! Running ───┤                                                            ├─→ merge
//!            └─ heuristics: checklist ∥ red flags ∥ style (deadline) ─────┘
//! ```
//!
//! The skill match is the critical path: if it fails or misses its deadline the analysis
//! fails and the heuristics branch is dropped. Everything else degrades.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::heuristics::HeuristicEvaluator;
use crate::analysis::interview::InterviewPrepGenerator;
use crate::analysis::invoker::{CallGate, RetryPolicy};
use crate::analysis::models::{
    compute_match_score, AnalysisReport, AnalysisRequest, AnalysisStatus, Component,
};
use crate::analysis::skill_matcher::{MatchError, MatcherSettings, SkillExtractor, SkillMatcher};
use crate::analysis::structured::{settle, StructuredCaller};
use crate::index::VectorIndex;
use crate::llm_client::StructuredGenerator;

/// Tunables for one coordinator. Shared by every request it serves.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// Per-request bound on concurrent external calls.
    pub max_in_flight: usize,
    /// Deadline for the best-effort work (heuristics and interview prep).
    pub deadline: Duration,
    /// Separate, longer deadline for the skill match.
    pub skill_deadline: Duration,
    pub retry: RetryPolicy,
    pub matcher: MatcherSettings,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            deadline: Duration::from_secs(60),
            skill_deadline: Duration::from_secs(90),
            retry: RetryPolicy::default(),
            matcher: MatcherSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    Validation,
    Dependency,
    Timeout,
}

impl AnalysisErrorKind {
    pub fn user_message(self) -> &'static str {
        match self {
            AnalysisErrorKind::Validation => "your input was invalid",
            AnalysisErrorKind::Dependency => {
                "the analysis service is currently unavailable, try again"
            }
            AnalysisErrorKind::Timeout => "the analysis took too long, try again",
        }
    }
}

/// Classified failure of an analysis. No report accompanies it.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{}: {detail}", .kind.user_message())]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub detail: String,
}

impl AnalysisError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self {
            kind: AnalysisErrorKind::Validation,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            kind: AnalysisErrorKind::Timeout,
            detail: detail.into(),
        }
    }
}

impl From<MatchError> for AnalysisError {
    fn from(e: MatchError) -> Self {
        Self {
            kind: AnalysisErrorKind::Dependency,
            detail: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Received,
    Running,
    Completed,
    PartiallyCompleted,
    Failed,
}

fn transition(analysis_id: Uuid, from: AnalysisState, to: AnalysisState) {
    info!("Analysis {analysis_id}: {from:?} -> {to:?}");
}

pub struct AnalysisCoordinator {
    generator: Arc<dyn StructuredGenerator>,
    matcher: SkillMatcher,
    evaluator: HeuristicEvaluator,
    interview: InterviewPrepGenerator,
    settings: AnalysisSettings,
}

impl AnalysisCoordinator {
    /// Collaborators are process-lifetime dependencies; per-request state (call gate,
    /// corpus, deadlines) is created inside each analysis.
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        index: Arc<dyn VectorIndex>,
        extractor: Arc<dyn SkillExtractor>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            generator,
            matcher: SkillMatcher::new(extractor, index, settings.matcher.clone()),
            evaluator: HeuristicEvaluator,
            interview: InterviewPrepGenerator,
            settings,
        }
    }

    pub async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.analyze_request(Uuid::new_v4(), AnalysisRequest::new(resume_text, job_description))
            .await
    }

    /// Runs one analysis under `analysis_id`, which tags every log line it emits.
    pub async fn analyze_request(
        &self,
        analysis_id: Uuid,
        request: AnalysisRequest,
    ) -> Result<AnalysisReport, AnalysisError> {
        info!(
            "Analysis {analysis_id}: received ({} resume chars, {} job description chars)",
            request.resume_text.len(),
            request.job_description.len()
        );

        if let Err(e) = validate(&request) {
            warn!("Analysis {analysis_id}: rejected: {}", e.detail);
            transition(analysis_id, AnalysisState::Received, AnalysisState::Failed);
            return Err(e);
        }
        transition(analysis_id, AnalysisState::Received, AnalysisState::Running);

        match self.run(analysis_id, &request).await {
            Ok(report) => {
                let state = if report.is_degraded() {
                    AnalysisState::PartiallyCompleted
                } else {
                    AnalysisState::Completed
                };
                transition(analysis_id, AnalysisState::Running, state);
                info!(
                    "Analysis {analysis_id}: match_score={} over {} skills, {} degraded slices",
                    report.match_score,
                    report.skill_findings.len(),
                    report.degradations.len()
                );
                Ok(report)
            }
            Err(e) => {
                error!("Analysis {analysis_id}: failed ({:?}): {}", e.kind, e.detail);
                transition(analysis_id, AnalysisState::Running, AnalysisState::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        analysis_id: Uuid,
        request: &AnalysisRequest,
    ) -> Result<AnalysisReport, AnalysisError> {
        let calls = StructuredCaller::new(
            self.generator.clone(),
            CallGate::new(self.settings.max_in_flight),
            self.settings.retry.clone(),
        );
        let started = Instant::now();
        let deadline = started + self.settings.deadline;
        let skill_deadline = started + self.settings.skill_deadline;

        let critical = async {
            let findings = timeout_at(skill_deadline, self.matcher.match_skills(request, &calls))
                .await
                .map_err(|_| {
                    AnalysisError::timeout(format!(
                        "skill match did not finish within {}s",
                        self.settings.skill_deadline.as_secs()
                    ))
                })??;
            let questions = timeout_at(
                deadline,
                self.interview.generate(request, &findings, &calls),
            )
            .await;
            Ok::<_, AnalysisError>((findings, questions))
        };
        let heuristics = async {
            Ok::<_, AnalysisError>(self.evaluator.evaluate(request, &calls, deadline).await)
        };

        let ((skill_findings, questions), evaluation) = tokio::try_join!(critical, heuristics)?;

        if evaluation.degraded() {
            warn!(
                "Analysis {analysis_id}: {} heuristic slice(s) defaulted",
                evaluation.degradations.len()
            );
        }

        let mut degradations = evaluation.degradations;
        let interview_questions =
            settle(Component::InterviewPrep, questions, &mut degradations).unwrap_or_default();

        let mut checklist = evaluation.checklist;
        if !checklist.is_complete() {
            let filled = checklist.ensure_complete();
            error!("Analysis {analysis_id}: checklist missing {filled:?} at merge");
        }

        let status = if degradations.is_empty() {
            AnalysisStatus::Completed
        } else {
            AnalysisStatus::PartiallyCompleted
        };

        Ok(AnalysisReport {
            match_score: compute_match_score(&skill_findings),
            skill_findings,
            checklist,
            red_flags: evaluation.red_flags,
            style_critiques: evaluation.style_critiques,
            interview_questions,
            status,
            degradations,
        })
    }
}

fn validate(request: &AnalysisRequest) -> Result<(), AnalysisError> {
    if request.resume_text.trim().is_empty() {
        return Err(AnalysisError::validation("resume text is empty"));
    }
    if request.job_description.trim().is_empty() {
        return Err(AnalysisError::validation("job description is empty"));
    }
    Ok(())
}
