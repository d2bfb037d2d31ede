//! Document assembly
//!
//! Pure and deterministic: the same blueprint and sections always produce
//! byte-identical markdown, in ascending section `order` no matter how the
//! sections were supplied.

use draftsmith_blueprint::Blueprint;
use std::collections::BTreeMap;

use crate::sections::SectionContent;

pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Join accepted sections under their titles.
///
/// A section with no accepted content is kept as its italicized
/// description.
#[must_use]
pub fn assemble(blueprint: &Blueprint, sections: &BTreeMap<String, SectionContent>) -> String {
    let mut document = String::new();
    for section in blueprint.sections_in_order() {
        let body = match sections.get(&section.id) {
            Some(accepted) => accepted.content.trim().to_string(),
            None => format!("*{}*", section.description.trim()),
        };
        document.push_str(&format!("# {}\n\n{}{}", section.title, body, SECTION_SEPARATOR));
    }
    document
}
