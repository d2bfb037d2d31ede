//! Prompt fragments shared by several stages

use draftsmith_blueprint::{Blueprint, PromptConfig};

/// Appended to every prompt that asks for JSON.
pub(crate) const JSON_ONLY_INSTRUCTIONS: &str = "\n\nRespond with a single JSON value only. Do not wrap it in markdown code fences and do not add commentary before or after it.";

/// System prompt built from a blueprint's prompt configuration.
#[must_use]
pub fn system_prompt(blueprint: &Blueprint) -> String {
    let config = &blueprint.prompt_config;
    let mut prompt = format!(
        "You are {}, writing a {} ({}). Write in a {} tone.",
        config.role.trim(),
        blueprint.name,
        if blueprint.description.is_empty() {
            "business document"
        } else {
            blueprint.description.trim()
        },
        config.tone.trim()
    );

    push_list(&mut prompt, "Goals", &config.goals);
    push_list(&mut prompt, "Constraints", &config.constraints);
    prompt
}

/// The anti-hallucination rule list as a prompt block.
#[must_use]
pub fn anti_hallucination_block(config: &PromptConfig) -> String {
    let mut block = String::from("ACCURACY RULES (mandatory):");
    for rule in &config.anti_hallucination_rules {
        block.push_str("\n- ");
        block.push_str(rule.trim());
    }
    block
}

fn push_list(prompt: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    prompt.push_str("\n\n");
    prompt.push_str(heading);
    prompt.push(':');
    for item in items {
        prompt.push_str("\n- ");
        prompt.push_str(item.trim());
    }
}

/// `text`, or `fallback` when it is blank.
pub(crate) fn or_placeholder<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() { fallback } else { text.trim() }
}
