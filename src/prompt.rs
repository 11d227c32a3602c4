//! Prompt assembly for answer generation.

/// Instruction when the caller sent no history.
pub const GREETING_INSTRUCTION: &str =
    "Start with a friendly greeting since this is the first interaction";

/// Instruction when prior turns exist.
pub const CONTINUATION_INSTRUCTION: &str =
    "Continue the conversation naturally without greetings";

const PREAMBLE: &str = "You are a helpful assistant that reads documents of any kind and answers \
questions about them. Reply to the user's question naturally and conversationally.";

const ANALYSIS_RULES: &str = "\
- Any document type may appear: identity cards, resumes, invoices, contracts, reports, certificates, letters, forms
- Search the whole document for the relevant details before answering
- State facts confidently when the document clearly contains them
- Keep the tone conversational and the answer concise";

const DOCUMENT_TYPES: &str = "\
- Identity documents: names, numbers (possibly masked, e.g. XXXXXXXX1234), dates, addresses, relations (S/O, D/O, W/O)
- Resumes and CVs: name, contact details, skills, work history, education, certifications
- Business documents: company names, amounts, dates, terms, contacts, signatures
- Certificates: issuing institution, qualification, dates, holder, grades
- Invoices: seller and buyer, amounts, line items, dates, payment terms
- Contracts: parties, obligations, dates, amounts, conditions
- Reports: findings, figures, conclusions, recommendations
- Forms: every filled-in value, ticked boxes, signatures";

const DATE_RULES: &str = "\
- Work out durations step by step
 * Jan to Apr is about 4 months, Jan to Jun about 6, Jan to Dec about 12
 * Feb to Present, when the current month is July, is about 5 months
- Sum separate periods explicitly, e.g. \"4 months + 5 months = 9 months total\"
- Convert units on request, e.g. \"9 months = 0.75 years\" or \"2 years = 24 months\"
- Use only dates and periods found in the document, never invented figures
- When dates are ambiguous, say \"approximately\" and show the reasoning";

const STYLE_RULES: &str = "\
- Prefer phrasing such as \"The document shows...\", \"According to this...\", \"I can see that...\"
- Stay friendly and helpful
- Describe masked numbers (XXXXXXXX1234) as partially hidden for privacy
- Spell out relation abbreviations: S/O = Son Of, D/O = Daughter Of, W/O = Wife Of
- Give a thorough overview when asked for a summary
- Use bullet points with the • symbol when asked for a list
- Say information is missing only after checking the whole document";

/// Builds the generation prompt from retrieved chunks and history.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the prompt.
    ///
    /// Chunks are joined with a blank line. `is_first_turn` selects the
    /// greeting instruction over the continuation instruction.
    pub fn build(
        &self,
        question: &str,
        chunks: &[&str],
        conversation: &str,
        is_first_turn: bool,
    ) -> String {
        let opening = if is_first_turn {
            GREETING_INSTRUCTION
        } else {
            CONTINUATION_INSTRUCTION
        };
        let document_content = chunks.join("\n\n");

        format!(
            "{PREAMBLE}\n\n\
             DOCUMENT ANALYSIS:\n{opening}\n{ANALYSIS_RULES}\n\n\
             DOCUMENT TYPES:\n{DOCUMENT_TYPES}\n\n\
             DATES AND DURATIONS:\n{DATE_RULES}\n\n\
             RESPONSE STYLE:\n{STYLE_RULES}\n\n\
             Recent conversation:\n{conversation}\n\n\
             Document Content:\n{document_content}\n\n\
             Question: {question}\n\n\
             Answer in a friendly, conversational tone:"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_greets() {
        let prompt = PromptBuilder::new().build("Who?", &["chunk"], "", true);
        assert!(prompt.contains(GREETING_INSTRUCTION));
        assert!(!prompt.contains(CONTINUATION_INSTRUCTION));
    }

    #[test]
    fn test_follow_up_continues() {
        let prompt = PromptBuilder::new().build("Who?", &["chunk"], "User: hi\n", false);
        assert!(prompt.contains(CONTINUATION_INSTRUCTION));
        assert!(!prompt.contains(GREETING_INSTRUCTION));
        assert!(prompt.contains("Recent conversation:\nUser: hi\n"));
    }

    #[test]
    fn test_sections_in_order() {
        let prompt = PromptBuilder::new().build(
            "How long did she work there?",
            &["first chunk", "second chunk"],
            "User: earlier\n",
            false,
        );

        let conversation = prompt.find("Recent conversation:").unwrap();
        let content = prompt.find("Document Content:").unwrap();
        let question = prompt.find("Question: How long did she work there?").unwrap();
        assert!(prompt.find("DATES AND DURATIONS:").unwrap() < conversation);
        assert!(conversation < content);
        assert!(content < question);
        assert!(prompt.contains("first chunk\n\nsecond chunk"));
        assert!(prompt.ends_with("Answer in a friendly, conversational tone:"));
    }

    #[test]
    fn test_deterministic() {
        let builder = PromptBuilder::new();
        let a = builder.build("q", &["x", "y"], "", true);
        let b = builder.build("q", &["x", "y"], "", true);
        assert_eq!(a, b);
    }
}
