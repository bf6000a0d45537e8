//! Computed field engine.
//!
//! Rollup and formula values are derived from current record state on every
//! call. Nothing is cached, so there is never a stale value to invalidate.

mod arith;
mod formula;
mod rollup;

pub use arith::{evaluate_arithmetic, is_arithmetic, ArithError};
pub use formula::compute_formula;
pub use rollup::compute_rollup;

use crate::resolver::CollectionResolver;
use crate::schema::{Collection, Field, FieldKind, Record};
use crate::value::Value;

/// Value of `field` on `record`: the stored value for ordinary fields, a fresh
/// computation for rollups and formulas. Absent keys read as null.
pub fn value_of(
    record: &Record,
    field: &Field,
    collection: &Collection,
    resolver: Option<&dyn CollectionResolver>,
) -> Value {
    match &field.kind {
        FieldKind::Rollup { rollup } => match rollup {
            Some(config) => compute_rollup(record, config, collection, resolver)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            None => Value::Null,
        },
        FieldKind::Formula { formula } => match formula {
            Some(config) => compute_formula(record, &config.expression),
            None => Value::Null,
        },
        _ => record.get(&field.id).cloned().unwrap_or(Value::Null),
    }
}
