// Prompt constants for the evaluation module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;

/// Scoring prompt template. Placeholders are replaced in a single pass by
/// `build_evaluation_prompt`, so candidate text containing `{cv}` is never re-expanded.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"You are an evaluator. Use the following job description and rubric to evaluate:

Job Description:
{description}

Rubric:
{rubric}

CV Input:
{cv}

Project Input:
{project}

Define at least these scoring parameters:
 CV Evaluation (Match Rate)
 Technical Skills Match (backend, databases, APIs, cloud, AI/LLM exposure).
 Experience Level (years, project complexity).
 Relevant Achievements (impact, scale).
 Cultural Fit (communication, learning attitude).
 Project Deliverable Evaluation
 Correctness (meets requirements: prompt design, chaining, RAG, handling errors).
 Code Quality (clean, modular, testable).
 Resilience (handles failures, retries).
 Documentation (clear README, explanation of trade-offs).
 Creativity / Bonus (optional improvements like authentication, deployment, dashboards).
 Each parameter can be scored 1–5, then aggregated to final score

Return strict JSON with structure:
{
  "cv": {
    "match_rate": float,
    "feedback": string
  },
  "project": {
    "score": float,
    "feedback": string
  },
  "overall_summary": string
}

IMPORTANT: cv match_rate is between 0-1 and project score is between 1-10. {json_only}"#;

/// Builds the scoring prompt. Deterministic: identical inputs give identical prompts.
pub fn build_evaluation_prompt(description: &str, rubric: &str, cv: &str, project: &str) -> String {
    let mut prompt = String::with_capacity(
        EVALUATION_PROMPT_TEMPLATE.len() + description.len() + rubric.len() + cv.len() + project.len(),
    );
    let mut rest = EVALUATION_PROMPT_TEMPLATE;

    while let Some(start) = rest.find('{') {
        let (head, tail) = rest.split_at(start);
        prompt.push_str(head);

        let substitution = tail.find('}').and_then(|end| {
            let value = match &tail[1..end] {
                "description" => description,
                "rubric" => rubric,
                "cv" => cv,
                "project" => project,
                "json_only" => JSON_ONLY_INSTRUCTION,
                _ => return None,
            };
            Some((value, end))
        });

        match substitution {
            Some((value, end)) => {
                prompt.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
    }
    prompt.push_str(rest);
    prompt
}
