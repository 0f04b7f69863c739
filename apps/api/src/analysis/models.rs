//! Data model for a single resume critique: the request, its findings, and the merged report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Optional facts about the uploaded document, fed to the red-flag check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: Option<String>,
    /// Pages in the source PDF; drives the one-page rule.
    pub page_count: Option<usize>,
}

/// One analysis request. Immutable once built; both texts are checked for emptiness
/// by the coordinator before any external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub resume_text: String,
    pub job_description: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl AnalysisRequest {
    pub fn new(resume_text: impl Into<String>, job_description: impl Into<String>) -> Self {
        Self {
            resume_text: resume_text.into(),
            job_description: job_description.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.metadata.filename = Some(filename.into());
        self
    }

    pub fn with_page_count(mut self, page_count: usize) -> Self {
        self.metadata.page_count = Some(page_count);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Hard,
    Soft,
}

/// A skill named by the job description, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSkill {
    pub name: String,
    pub category: SkillCategory,
}

/// A single skill's verdict. For matched skills the text is the best resume excerpt;
/// for unmatched skills it is an improvement recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillFinding {
    pub skill: String,
    pub category: SkillCategory,
    pub evidence_or_recommendation: String,
    pub matched: bool,
}

/// The seven-point recruiter tick list. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Criterion {
    #[serde(rename = "Job Title Match")]
    JobTitleMatch,
    #[serde(rename = "Industry Match")]
    IndustryMatch,
    #[serde(rename = "Product Knowledge")]
    ProductKnowledge,
    #[serde(rename = "Specialist Technical")]
    SpecialistTechnical,
    #[serde(rename = "Relevant Qualifications")]
    RelevantQualifications,
    #[serde(rename = "Ability to Add Value")]
    AbilityToAddValue,
    #[serde(rename = "Years Experience")]
    YearsExperience,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Criterion::JobTitleMatch,
        Criterion::IndustryMatch,
        Criterion::ProductKnowledge,
        Criterion::SpecialistTechnical,
        Criterion::RelevantQualifications,
        Criterion::AbilityToAddValue,
        Criterion::YearsExperience,
    ];
}

/// Recruiter checklist. Always holds every `Criterion`; constructors fill gaps with `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checklist(BTreeMap<Criterion, bool>);

impl Checklist {
    /// Every criterion unresolved.
    pub fn all_failed() -> Self {
        Self(Criterion::ALL.iter().map(|&c| (c, false)).collect())
    }

    /// Builds a checklist from possibly partial verdicts, defaulting the rest to `false`.
    /// Returns the checklist and the criteria that had to be defaulted.
    pub fn from_partial(
        verdicts: impl IntoIterator<Item = (Criterion, bool)>,
    ) -> (Self, Vec<Criterion>) {
        let mut checklist = Self(verdicts.into_iter().collect());
        let defaulted = checklist.ensure_complete();
        (checklist, defaulted)
    }

    /// Inserts `false` for any missing criterion. Returns the criteria that were added.
    pub fn ensure_complete(&mut self) -> Vec<Criterion> {
        let mut added = Vec::new();
        for criterion in Criterion::ALL {
            if !self.0.contains_key(&criterion) {
                self.0.insert(criterion, false);
                added.push(criterion);
            }
        }
        added
    }

    #[cfg(test)]
    pub fn get(&self, criterion: Criterion) -> bool {
        self.0.get(&criterion).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_complete(&self) -> bool {
        Criterion::ALL.iter().all(|c| self.0.contains_key(c))
    }

    pub fn passed_count(&self) -> usize {
        self.0.values().filter(|&&v| v).count()
    }
}

impl Default for Checklist {
    fn default() -> Self {
        Self::all_failed()
    }
}

pub type RedFlag = String;
pub type StyleCritique = String;
pub type InterviewQuestion = String;

/// The part of the report that may fall back to a safe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Checklist,
    RedFlags,
    StyleCritique,
    InterviewPrep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    /// The dependency kept failing after retries.
    Dependency,
    /// The model's output never matched the schema, even after the repair retry.
    Schema,
    /// The overall deadline elapsed before the slice completed.
    Timeout,
}

/// A slice of the report that was replaced by its safe default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub component: Component,
    pub reason: DegradationReason,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed,
    PartiallyCompleted,
}

/// The merged, immutable critique returned to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Recomputed from `skill_findings`, never taken from a model.
    pub match_score: u8,
    pub skill_findings: Vec<SkillFinding>,
    pub checklist: Checklist,
    pub red_flags: Vec<RedFlag>,
    pub style_critiques: Vec<StyleCritique>,
    pub interview_questions: Vec<InterviewQuestion>,
    pub status: AnalysisStatus,
    pub degradations: Vec<Degradation>,
}

impl AnalysisReport {
    pub fn is_degraded(&self) -> bool {
        self.status == AnalysisStatus::PartiallyCompleted
    }
}

/// `round(100 * matched / total)`. Zero skills scores zero.
pub fn compute_match_score(findings: &[SkillFinding]) -> u8 {
    if findings.is_empty() {
        return 0;
    }
    let matched = findings.iter().filter(|f| f.matched).count();
    ((matched as f64 * 100.0) / findings.len() as f64)
        .round()
        .clamp(0.0, 100.0) as u8
}
