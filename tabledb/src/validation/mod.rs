use crate::error::{Result, TableDbError};
use crate::schema::{normalize_collection, Collection, FieldKind, View};
use crate::value::Value;
use std::collections::HashSet;

/// Result of validating a collection
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Check a collection snapshot for structural problems.
///
/// Duplicate field, view and record ids are always errors. Stored values that
/// do not fit their field and view references to fields that no longer exist
/// are errors in strict mode and warnings otherwise; the engine itself
/// tolerates both.
pub fn validate_collection(collection: &Collection, strict: bool) -> ValidationResult {
    let mut result = ValidationResult::default();

    for id in duplicates(collection.schema.iter().map(|f| f.id.as_str())) {
        result.errors.push(format!("Duplicate field id '{id}'"));
    }
    for id in duplicates(collection.views.iter().map(|v| v.id.as_str())) {
        result.errors.push(format!("Duplicate view id '{id}'"));
    }
    for id in duplicates(collection.records.iter().map(|r| r.id.as_str())) {
        result.errors.push(format!("Duplicate record id '{id}'"));
    }

    for field in &collection.schema {
        if let FieldKind::Rollup { rollup: Some(config) } = &field.kind {
            let is_relation = collection
                .field(&config.relation_field_id)
                .is_some_and(|f| matches!(f.kind, FieldKind::Relation { .. }));
            if !is_relation {
                add_issue(
                    &mut result,
                    strict,
                    format!(
                        "Rollup '{}' uses '{}', which is not a relation field",
                        field.id, config.relation_field_id
                    ),
                );
            }
        }
    }

    for record in &collection.records {
        for field in &collection.schema {
            let Some(value) = record.get(&field.id) else {
                continue;
            };
            if let Some(problem) = value_problem(&field.kind, value) {
                add_issue(
                    &mut result,
                    strict,
                    format!("Record '{}' field '{}' {}", record.id, field.id, problem),
                );
            }
        }
    }

    for view in &collection.views {
        for field_id in view_references(view) {
            if collection.field(field_id).is_none() {
                add_issue(
                    &mut result,
                    strict,
                    format!("View '{}' references unknown field '{}'", view.id, field_id),
                );
            }
        }
    }

    result
}

/// Normalize a collection and validate it. Returns the warnings, or a
/// validation error listing every error found.
pub fn validate_and_prepare(collection: &mut Collection, strict: bool) -> Result<Vec<String>> {
    normalize_collection(collection);
    let result = validate_collection(collection, strict);

    if !result.is_ok() {
        return Err(TableDbError::Validation(format!(
            "Collection validation failed:\n  - {}",
            result.errors.join("\n  - ")
        )));
    }

    Ok(result.warnings)
}

fn add_issue(result: &mut ValidationResult, strict: bool, message: String) {
    if strict {
        result.errors.push(message);
    } else {
        result.warnings.push(message);
    }
}

fn duplicates<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut reported = Vec::new();
    for id in ids {
        if !seen.insert(id) && !reported.contains(&id) {
            reported.push(id);
        }
    }
    reported
}

fn value_problem(kind: &FieldKind, value: &Value) -> Option<String> {
    match (kind, value) {
        (_, Value::Null) => None,
        (FieldKind::Relation { .. } | FieldKind::MultiSelect(_), Value::Ids(_)) => None,
        (FieldKind::Relation { .. } | FieldKind::MultiSelect(_), other) => {
            Some(format!("expected a list, got {}", value_type(other)))
        }
        (FieldKind::Select(choices) | FieldKind::Status(choices), Value::Text(s)) => {
            if choices.options.is_empty() || choices.options.contains(s) {
                None
            } else {
                Some(format!("value '{}' is not one of {:?}", s, choices.options))
            }
        }
        (FieldKind::Select(_) | FieldKind::Status(_), other) => {
            Some(format!("expected text, got {}", value_type(other)))
        }
        _ => None,
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Text(_) => "text",
        Value::Ids(_) => "list",
    }
}

fn view_references(view: &View) -> Vec<&str> {
    let mut refs: Vec<&str> = Vec::new();
    refs.extend(view.sort.iter().map(|s| s.field_id.as_str()));
    refs.extend(view.filter.iter().map(|f| f.field_id.as_str()));
    refs.extend(view.hidden_fields.iter().map(String::as_str));
    refs.extend(view.group_by.as_deref());
    refs.extend(view.card_cover_field.as_deref());
    refs.extend(view.card_fields.iter().flatten().map(String::as_str));
    refs.extend(view.field_order.iter().flatten().map(String::as_str));
    refs.extend(view.column_widths.iter().flat_map(|w| w.keys()).map(String::as_str));

    let mut seen = HashSet::new();
    refs.retain(|id| seen.insert(*id));
    refs
}
