// Analysis core: skill matching, heuristic evaluation, and interview prep, merged by
// the coordinator into one report.
// All model calls go through llm_client; all index queries through index::VectorIndex.

pub mod coordinator;
pub mod handlers;
pub mod heuristics;
pub mod interview;
pub mod invoker;
pub mod models;
pub mod prompts;
pub mod skill_matcher;
pub mod structured;

#[cfg(test)]
pub mod test_support;
