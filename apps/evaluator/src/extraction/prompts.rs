use crate::llm_client::prompts::VERBATIM_INSTRUCTION;

/// Instruction sent alongside an inline PDF when native parsing found no text.
pub fn pdf_extraction_prompt() -> String {
    format!(
        "Extract ALL text content from this PDF document. {VERBATIM_INSTRUCTION} Include:\n\n\
         - Personal information (name, email, phone)\n\
         - Education history\n\
         - Work experience\n\
         - Skills and technologies\n\
         - Certifications\n\
         - Projects and achievements\n\n\
         Return the text exactly as it appears in the document."
    )
}
