// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every prompt whose answer is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "Return ONLY the raw JSON without any markdown \
    formatting, code blocks, or additional text.";

/// Appended to every prompt whose answer is used as plain text.
pub const VERBATIM_INSTRUCTION: &str = "Return ONLY the raw extracted text without any \
    additional comments, formatting, or explanations.";
