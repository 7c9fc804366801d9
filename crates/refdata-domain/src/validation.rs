//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Bridges validator derives onto domain errors."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{DomainError, Result};
use crate::messages::EntityKind;

/// Rejects empty or whitespace-only strings.
pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Run the derived validation for `value` and map the first failing field
/// onto a `referenceData.error.<entity>.<field>.<problem>` key.
pub fn validate<T: Validate>(entity: EntityKind, value: &T) -> Result<()> {
    value
        .validate()
        .map_err(|errors| to_domain_error(entity, &errors))
}

fn to_domain_error(entity: EntityKind, errors: &ValidationErrors) -> DomainError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let Some((field, problems)) = fields.into_iter().next() else {
        return DomainError::validation(
            entity.field_key("entity", "invalid"),
            format!("{entity} is invalid"),
        );
    };
    let problem = match problems.first().map(|p| p.code.as_ref()) {
        Some("required") | Some("length") => "required",
        Some("range") => "outOfRange",
        _ => "invalid",
    };
    let field = camel_case(&field);
    DomainError::validation(
        entity.field_key(&field, problem),
        format!("{entity}.{field} is {problem}"),
    )
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
