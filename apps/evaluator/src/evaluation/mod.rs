// Asynchronous evaluation pipeline:
// submission → queue → worker → scoring client (model fallback) → record store.
// All model calls go through llm_client.

pub mod client;
pub mod handlers;
pub mod prompts;
pub mod score;
pub mod submission;
pub mod worker;
