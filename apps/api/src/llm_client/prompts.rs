// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt that enforces JSON-only output. Used for every structured call.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to every recruiter-persona prompt.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Judge ONLY from the resume text provided. Do NOT infer, interpolate, or \
    invent experience the candidate has not written down. \
    If the resume does not show evidence for something, treat it as absent.";
