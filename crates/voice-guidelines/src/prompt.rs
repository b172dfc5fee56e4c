/// Prompt construction. Pure: no I/O.
use std::fmt::Write as _;

use mcp_common::openai::Message;

use crate::model::{Audience, Intent, Rule, VariantSet};

/// Everything the generator needs for one rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub original_text: String,
    pub intent: Intent,
    pub audience: Audience,
    /// Trimmed user override; `None` when absent or blank
    pub instructions: Option<String>,
    /// Relevance-ordered, duplicate-free
    pub selected_rules: Vec<Rule>,
}

pub fn build_request(
    original_text: &str,
    intent: Intent,
    audience: Audience,
    rules: &[&Rule],
    instructions: Option<&str>,
) -> GenerationRequest {
    let mut selected_rules: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules {
        if !selected_rules.iter().any(|r| r.id == rule.id) {
            selected_rules.push((*rule).clone());
        }
    }

    GenerationRequest {
        original_text: original_text.to_string(),
        intent,
        audience,
        instructions: instructions
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        selected_rules,
    }
}

pub fn system_prompt() -> String {
    format!(
        "You are a UX writer who rewrites short interface text (buttons, tooltips, errors, \
labels, helper text, dialog titles) so it follows a brand voice-and-tone guide.\n\n\
Rules:\n\
- Follow the numbered guidance you are given. Each guideline has an ID in square brackets.\n\
- When the user adds an override, it takes priority over the general guidance.\n\
- Keep the meaning of the original text. Do not invent features or facts.\n\
- Return exactly {count} distinct variants, best first.\n\
- For each variant give a one-sentence rationale and the IDs of the guidelines it follows.\n\n\
Output ONLY a JSON object of this shape, nothing else:\n\
{{\"variants\":[{{\"text\":\"<rewrite>\",\"rationale\":\"<why>\",\"appliedRules\":[\"<guideline-id>\"]}}]}}",
        count = VariantSet::LEN
    )
}

pub fn user_message(request: &GenerationRequest) -> String {
    let mut out = String::with_capacity(512);

    let _ = writeln!(out, "INTENT: {}", request.intent);
    let _ = writeln!(out, "AUDIENCE: {}", request.audience);

    out.push_str("\nGUIDELINES:\n");
    for rule in &request.selected_rules {
        let _ = writeln!(out, "- [{}] {}", rule.id, rule.text);
    }

    if let Some(instructions) = &request.instructions {
        out.push_str("\nUSER OVERRIDE (higher priority than the guidelines above):\n");
        out.push_str(instructions);
        out.push('\n');
    }

    out.push_str("\nORIGINAL TEXT:\n");
    out.push_str(&request.original_text);
    out.push('\n');
    out
}

pub fn render_messages(request: &GenerationRequest) -> Vec<Message> {
    vec![
        Message::system(system_prompt()),
        Message::user(user_message(request)),
    ]
}
