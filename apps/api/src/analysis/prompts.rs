// All LLM prompt constants and schema descriptors for the Analysis module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::SchemaDescriptor;

/// Resume text is cut to this many characters before it is placed in a prompt.
pub const MAX_RESUME_PROMPT_CHARS: usize = 3000;
/// Job description text is cut to this many characters before it is placed in a prompt.
pub const MAX_JD_PROMPT_CHARS: usize = 2000;

pub const SKILL_EXTRACTION_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "skill_extraction",
    shape: r#"{
  "hard_skills": ["Python", "SQL"],
  "soft_skills": ["Stakeholder communication"]
}"#,
};

/// Replace `{job_description}` before sending.
pub const SKILL_EXTRACTION_PROMPT: &str = r#"Analyze the following job description and extract the key skills it requires.

HARD SKILLS: languages, frameworks, tools, platforms, certifications, domain techniques.
SOFT SKILLS: interpersonal and working-style skills the role explicitly asks for.

Use the short canonical name of each skill ("Python", not "strong Python programming skills").
List each skill once, in the order it first appears in the job description.

JOB DESCRIPTION:
{job_description}"#;

pub const CHECKLIST_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "recruiter_checklist",
    shape: r#"{
  "job_title_match": true,
  "industry_match": false,
  "product_knowledge": true,
  "specialist_technical": true,
  "relevant_qualifications": false,
  "ability_to_add_value": true,
  "years_experience_visible": true
}"#,
};

/// Replace: {evidence_instruction}, {resume_text}, {job_description}
pub const CHECKLIST_PROMPT: &str = r#"You are a panel of strict, expert recruiters reviewing a resume against a job description.

{evidence_instruction}

Rate each point of the 7-POINT TICK LIST as true or false based on evidence in the resume:
- job_title_match: Are the candidate's job titles clear, standard, and close to the target role?
- industry_match: Is relevant industry experience obvious?
- product_knowledge: Are specific products or tools mentioned?
- specialist_technical: Are deep technical skills shown?
- relevant_qualifications: Are degrees or certifications visible?
- ability_to_add_value: Are there clear wins (revenue, growth, savings)?
- years_experience_visible: Is the total years of experience easy to find?

RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}"#;

pub const RED_FLAGS_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "red_flags",
    shape: r#"{
  "red_flags": ["Found a Hotmail address. Use Gmail or Outlook."]
}"#,
};

/// Replace: {evidence_instruction}, {resume_text}, {filename}, {page_count}
pub const RED_FLAGS_PROMPT: &str = r#"You are a panel of strict, expert recruiters looking for the pet peeves that get a resume rejected.

{evidence_instruction}

List ONLY rules that are VIOLATED, one short sentence each with the fix:
- Email must be professional (gmail, outlook, or own domain). No Hotmail.
- One page unless the candidate has more than 20 years of experience (see PAGE COUNT).
- Address should be "City, State" only. No full street addresses.
- File name should be "FirstName LastName Resume". No "Version 1", "Final", or role names.
- No Objective or Summary section.
- Single-column layout (infer from reading order if it jumps around).

Return an empty list if nothing is violated.

FILE NAME: {filename}
PAGE COUNT: {page_count}

RESUME:
{resume_text}"#;

pub const STYLE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "style_critique",
    shape: r#"{
  "style_critiques": ["Bullet points under 'Software Engineer' lack quantifiable metrics."]
}"#,
};

/// Replace: {evidence_instruction}, {resume_text}
pub const STYLE_PROMPT: &str = r#"You are an expert recruiter critiquing the writing style of a resume.

{evidence_instruction}

Check:
- Tone: plain, direct language. No fluff or thesaurus words.
- Quantification: achievements carry numbers or metrics.
- Methodology: bullets explain HOW a result was achieved, not just what.

Give each critique as one short, specific sentence naming the section or bullet it applies to.

RESUME:
{resume_text}"#;

pub const INTERVIEW_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "interview_prep",
    shape: r#"{
  "questions": ["The role needs SQL. Walk me through the most complex query you have written."]
}"#,
};

/// Number of interview questions requested.
pub const INTERVIEW_QUESTION_COUNT: usize = 3;

/// Replace: {count}, {missing_skills}, {matched_skills}, {resume_text}, {job_description}
pub const INTERVIEW_PROMPT: &str = r#"You are an expert technical interviewer preparing for a screening call.

Write {count} tough, candidate-specific interview questions. Focus on the skills the resume
does NOT show evidence for, so the questions probe the candidate's weakest areas. If every
skill is covered, probe the weakest evidence instead.

SKILLS WITHOUT EVIDENCE:
{missing_skills}

SKILLS WITH EVIDENCE:
{matched_skills}

RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}"#;

/// Replace: {original_prompt}, {previous_output}, {violation}
pub const REPAIR_PROMPT_TEMPLATE: &str = r#"Your previous answer did not match the required JSON schema.

VIOLATION:
{violation}

YOUR PREVIOUS ANSWER:
{previous_output}

Answer the ORIGINAL REQUEST again, returning ONLY JSON that matches the schema exactly.

ORIGINAL REQUEST:
{original_prompt}"#;

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Fills `{name}` placeholders in one left-to-right pass. Inserted values are never
/// rescanned, so a resume that happens to contain `{job_description}` stays literal.
/// Unknown placeholders and stray braces are kept as-is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let placeholder = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match placeholder {
            Some((value, after)) => {
                filled.push_str(value);
                rest = after;
            }
            None => {
                filled.push('{');
                rest = tail;
            }
        }
    }
    filled.push_str(rest);
    filled
}
