//! Load-time blueprint checks and user input validation

use draftsmith_utils::error::BlueprintError;
use std::collections::HashSet;

use crate::inputs::UserInputs;
use crate::model::{Blueprint, InputType};

impl Blueprint {
    /// Structural checks run once when a blueprint is loaded.
    ///
    /// # Errors
    ///
    /// `DuplicateSectionId` for repeated section ids, `Invalid` for any
    /// other structural problem.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        let invalid = |reason: String| BlueprintError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.sections.is_empty() {
            return Err(invalid("at least one section is required".to_string()));
        }

        let mut ids = HashSet::new();
        let mut orders = HashSet::new();
        for section in &self.sections {
            if section.id.trim().is_empty() {
                return Err(invalid(format!(
                    "section '{}' has an empty id",
                    section.title
                )));
            }
            if !ids.insert(section.id.as_str()) {
                return Err(BlueprintError::DuplicateSectionId {
                    name: self.name.clone(),
                    id: section.id.clone(),
                });
            }
            if !orders.insert(section.order) {
                return Err(invalid(format!(
                    "section order {} is used more than once",
                    section.order
                )));
            }
        }

        let mut input_ids = HashSet::new();
        for input in &self.inputs {
            if !input_ids.insert(input.id.as_str()) {
                return Err(invalid(format!("input id '{}' is declared twice", input.id)));
            }
        }

        if let Some(rubric) = &self.rubric {
            if rubric.criteria.is_empty() {
                return Err(invalid("rubric has no criteria".to_string()));
            }
            for criterion in &rubric.criteria {
                if let Some(weight) = criterion.weight
                    && !(weight > 0.0 && weight.is_finite())
                {
                    return Err(invalid(format!(
                        "rubric criterion '{}' must have a positive weight, got {weight}",
                        criterion.id
                    )));
                }
            }
            if !(1.0..=5.0).contains(&rubric.passing_score) {
                return Err(invalid(format!(
                    "rubric passing_score must be between 1 and 5, got {}",
                    rubric.passing_score
                )));
            }
        }

        let problems = self.prompt_config.problems();
        if !problems.is_empty() {
            return Err(invalid(format!(
                "prompt configuration: {}",
                problems.join("; ")
            )));
        }

        Ok(())
    }

    /// Check user inputs against the declared input specs.
    ///
    /// Returns one message per problem; an empty list means the inputs are
    /// usable. Unknown input ids are allowed and passed through as context.
    #[must_use]
    pub fn validate_inputs(&self, inputs: &UserInputs) -> Vec<String> {
        let mut issues = Vec::new();

        for spec in &self.inputs {
            let value = inputs.get(&spec.id).map(str::trim).unwrap_or("");
            if value.is_empty() {
                if spec.required {
                    issues.push(format!(
                        "Missing required input '{}' ({})",
                        spec.id, spec.label
                    ));
                }
                continue;
            }

            let len = value.chars().count();
            if let Some(rules) = &spec.validation {
                if let Some(min) = rules.min_length
                    && len < min
                {
                    issues.push(format!(
                        "Input '{}' must be at least {min} characters (got {len})",
                        spec.id
                    ));
                }
                if let Some(max) = rules.max_length
                    && len > max
                {
                    issues.push(format!(
                        "Input '{}' must be at most {max} characters (got {len})",
                        spec.id
                    ));
                }
                if !rules.options.is_empty() && !rules.options.iter().any(|o| o == value) {
                    issues.push(format!(
                        "Input '{}' must be one of: {}",
                        spec.id,
                        rules.options.join(", ")
                    ));
                }
            }

            if spec.input_type == InputType::Number
                && value.replace([',', '$'], "").trim().parse::<f64>().is_err()
            {
                issues.push(format!("Input '{}' must be a number", spec.id));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(yaml: &str) -> Blueprint {
        serde_yaml::from_str(yaml).unwrap()
    }

    const WITH_INPUTS: &str = r#"
name: charter
sections:
  - id: scope
    title: Scope
    order: 1
inputs:
  - id: project_name
    label: Project name
    required: true
    validation:
      min_length: 3
      max_length: 40
  - id: priority
    label: Priority
    type: select
    validation:
      options: [low, medium, high]
  - id: budget
    label: Budget
    type: number
rubric:
  criteria:
    - id: clarity
      name: Clarity
      weight: 2
"#;

    #[test]
    fn test_valid_blueprint_passes() {
        assert!(blueprint(WITH_INPUTS).validate().is_ok());
    }

    #[test]
    fn test_duplicate_section_id_rejected() {
        let bp = blueprint(
            "name: x\nsections:\n  - {id: a, title: A, order: 1}\n  - {id: a, title: B, order: 2}\n",
        );
        assert!(matches!(
            bp.validate(),
            Err(BlueprintError::DuplicateSectionId { id, .. }) if id == "a"
        ));
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let bp = blueprint(
            "name: x\nsections:\n  - {id: a, title: A, order: 1}\n  - {id: b, title: B, order: 1}\n",
        );
        assert!(matches!(bp.validate(), Err(BlueprintError::Invalid { .. })));
    }

    #[test]
    fn test_bad_rubric_rejected() {
        let mut bp = blueprint(WITH_INPUTS);
        if let Some(rubric) = bp.rubric.as_mut() {
            rubric.criteria[0].weight = Some(0.0);
        }
        assert!(matches!(bp.validate(), Err(BlueprintError::Invalid { .. })));

        let mut bp = blueprint(WITH_INPUTS);
        if let Some(rubric) = bp.rubric.as_mut() {
            rubric.passing_score = 6.0;
        }
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_validate_inputs_reports_each_problem() {
        let bp = blueprint(WITH_INPUTS);
        let inputs: UserInputs = [("priority", "urgent"), ("budget", "lots")]
            .into_iter()
            .collect();
        let issues = bp.validate_inputs(&inputs);
        assert_eq!(issues.len(), 3, "{issues:?}");
        assert!(issues[0].contains("project_name"));
        assert!(issues[1].contains("low, medium, high"));
        assert!(issues[2].contains("number"));
    }

    #[test]
    fn test_validate_inputs_accepts_good_values() {
        let bp = blueprint(WITH_INPUTS);
        let inputs: UserInputs = [
            ("project_name", "Atlas"),
            ("priority", "high"),
            ("budget", "$120,000"),
        ]
        .into_iter()
        .collect();
        assert!(bp.validate_inputs(&inputs).is_empty());
    }

    #[test]
    fn test_length_limits() {
        let bp = blueprint(WITH_INPUTS);
        let inputs: UserInputs = [("project_name", "AB")].into_iter().collect();
        let issues = bp.validate_inputs(&inputs);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("at least 3"));
    }
}
