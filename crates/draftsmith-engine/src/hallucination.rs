//! Invented-name heuristic
//!
//! Flags personal names that carry a professional title (an honorific such
//! as "Dr.", an executive acronym such as "CSO", or a credential suffix such
//! as ", PhD") but never appear in the grounding text. Generic executive
//! roles on [`ROLE_ALLOW_LIST`] do not count as titles. This is a best-effort
//! filter: it misses bare names and can flag legitimate ones.

use draftsmith_blueprint::UserInputs;
use once_cell::sync::Lazy;
use regex::Regex;

/// Executive abbreviations that look like titles but are generic roles.
pub const ROLE_ALLOW_LIST: &[&str] = &["CEO", "CTO", "CFO", "COO", "CIO", "CMO", "VP"];

// Group 1 is the title token, group 2 the name.
static TITLED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(Dr|Mr|Mrs|Ms|Prof|C[A-Z]O|[SE]?VP)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)",
    )
    .expect("valid titled-name regex")
});

static CREDENTIAL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+\s+[A-Z][a-z]+),\s*(?:PhD|MD|MBA|CPA|PMP)\b")
        .expect("valid credential regex")
});

/// Titled names in `content` that are absent from every user input value.
#[must_use]
pub fn find_suspect_names(content: &str, inputs: &UserInputs) -> Vec<String> {
    find_ungrounded_names(content, &inputs.concatenated())
}

/// Titled names in `content` that do not occur verbatim in `grounding`.
#[must_use]
pub fn find_ungrounded_names(content: &str, grounding: &str) -> Vec<String> {
    let mut suspects: Vec<String> = Vec::new();

    let titled = TITLED_NAME.captures_iter(content).filter_map(|caps| {
        let title = caps.get(1)?.as_str();
        if is_allowed_role(title) {
            return None;
        }
        caps.get(2).map(|m| m.as_str().to_string())
    });
    let credentialed = CREDENTIAL_NAME
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));

    for name in titled.chain(credentialed) {
        if grounding.contains(&name) {
            continue;
        }
        if !suspects.contains(&name) {
            suspects.push(name);
        }
    }
    suspects
}

/// Whether `content` names a titled person the user never mentioned.
#[must_use]
pub fn has_hallucination(content: &str, inputs: &UserInputs) -> bool {
    !find_suspect_names(content, inputs).is_empty()
}

fn is_allowed_role(title: &str) -> bool {
    ROLE_ALLOW_LIST.contains(&title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> UserInputs {
        [("sponsor", "Dr. Maria Lopez"), ("team", "Alan Reed, PMP")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_names_from_inputs_are_allowed() {
        let content = "Dr. Maria Lopez sponsors the work and Alan Reed, PMP runs delivery.";
        assert!(!has_hallucination(content, &inputs()));
    }

    #[test]
    fn test_invented_honorific_is_flagged() {
        let content = "The study was led by Dr. John Smith of Stanford.";
        assert_eq!(find_suspect_names(content, &inputs()), vec!["John Smith"]);
    }

    #[test]
    fn test_invented_credential_is_flagged() {
        let content = "Oversight comes from Jane Carter, CPA on the finance team.";
        assert!(has_hallucination(content, &inputs()));
    }

    #[test]
    fn test_bare_names_and_roles_pass() {
        let content = "The CEO and the CFO will approve. Project Atlas launches in Q3.";
        assert!(!has_hallucination(content, &UserInputs::new()));
    }

    #[test]
    fn test_generic_executive_roles_are_not_titles() {
        let content = "CEO Jane Doe and VP Sam Ortiz sign off; CFO approval follows.";
        assert!(!has_hallucination(content, &UserInputs::new()));
    }

    #[test]
    fn test_other_executive_titles_are_flagged() {
        let content = "CSO Jane Doe owns the audit and SVP Sam Ortiz funds it.";
        assert_eq!(
            find_suspect_names(content, &UserInputs::new()),
            vec!["Jane Doe", "Sam Ortiz"]
        );
    }

    #[test]
    fn test_names_in_free_grounding_text_pass() {
        let grounding = "Clarified: Dr. Priya Nair chairs the steering group.";
        assert!(find_ungrounded_names("Dr. Priya Nair signs off.", grounding).is_empty());
        assert_eq!(
            find_ungrounded_names("Dr. Priya Nair and Dr. Omar Haddad sign off.", grounding),
            vec!["Omar Haddad"]
        );
    }

    #[test]
    fn test_duplicates_reported_once() {
        let content = "Prof. Ada Byron wrote it. Later, Prof Ada Byron revised it.";
        assert_eq!(find_suspect_names(content, &UserInputs::new()), vec!["Ada Byron"]);
    }
}
