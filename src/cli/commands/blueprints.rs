//! Blueprints command implementation
//!
//! Handles `draftsmith blueprints list` and `draftsmith blueprints show`.

use anyhow::Result;

use draftsmith_blueprint::BlueprintStore;

use crate::cli::args::BlueprintCommands;
use crate::{Config, DraftError};

pub fn execute_blueprints_command(cmd: &BlueprintCommands, config: &Config) -> Result<()> {
    let store = BlueprintStore::new(Some(config.blueprints_dir()));

    match cmd {
        BlueprintCommands::List => {
            println!("Available blueprints:\n");
            for name in store.list() {
                let origin = if BlueprintStore::is_builtin(&name) {
                    "built-in"
                } else {
                    "user"
                };
                match store.load(&name) {
                    Ok(bp) => {
                        println!("  {name} ({origin}, v{})", bp.version);
                        if !bp.description.is_empty() {
                            println!("    {}", bp.description);
                        }
                    }
                    Err(e) => println!("  {name} ({origin}, invalid: {e})"),
                }
            }
            println!();
            println!("To inspect one:");
            println!("  draftsmith blueprints show <name>");
            Ok(())
        }
        BlueprintCommands::Show { name } => {
            let bp = store.load(name).map_err(DraftError::from)?;
            let default_target = config.default_target_words();

            println!("{} v{}", bp.name, bp.version);
            if !bp.description.is_empty() {
                println!("{}", bp.description);
            }

            println!("\nSections:");
            for section in bp.sections_in_order() {
                println!(
                    "  {}. {} [{}] ~{} words",
                    section.order,
                    section.title,
                    section.id,
                    bp.target_words(&section.id, default_target)
                );
                for sub in &section.subsections {
                    println!("       - {}", sub.title);
                }
            }

            if !bp.inputs.is_empty() {
                println!("\nInputs:");
                for input in &bp.inputs {
                    let marker = if input.required { " (required)" } else { "" };
                    println!("  {}: {}{marker}", input.id, input.label);
                }
            }

            if let Some(rubric) = &bp.rubric {
                println!("\nRubric (passing score {:.1}):", rubric.passing_score);
                for criterion in &rubric.criteria {
                    println!(
                        "  {} [{}] weight {:.2}",
                        criterion.name,
                        criterion.id,
                        criterion.effective_weight()
                    );
                }
            }
            Ok(())
        }
    }
}
