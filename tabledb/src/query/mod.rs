use crate::compute::value_of;
use crate::resolver::CollectionResolver;
use crate::schema::{
    Collection, Field, FieldKind, Filter, FilterOp, Record, SortDirection, SortKey, View,
};
use crate::value::{compare, comparable_number, display_string, to_filter_string, Value};
use std::cmp::Ordering;

/// Value a filter or sort sees for `field_id`: computed through the field when
/// it is still in the schema, otherwise whatever is stored under that key.
fn query_value(
    record: &Record,
    field: Option<&Field>,
    field_id: &str,
    collection: &Collection,
    resolver: Option<&dyn CollectionResolver>,
) -> Value {
    match field {
        Some(field) => value_of(record, field, collection, resolver),
        None => record.get(field_id).cloned().unwrap_or(Value::Null),
    }
}

fn threshold(filter: &Filter) -> f64 {
    comparable_number(&filter.value)
}

fn matches_filter(value: &Value, filter: &Filter) -> bool {
    let text = to_filter_string(value);
    let needle = filter.value.to_lowercase();
    match &filter.op {
        FilterOp::Contains => text.contains(&needle),
        FilterOp::NotContains => !text.contains(&needle),
        FilterOp::Equals => text == needle,
        FilterOp::NotEquals => text != needle,
        FilterOp::IsEmpty => value.is_empty(),
        FilterOp::IsNotEmpty => !value.is_empty(),
        FilterOp::Gt => value.to_comparable_number() > threshold(filter),
        FilterOp::Gte => value.to_comparable_number() >= threshold(filter),
        FilterOp::Lt => value.to_comparable_number() < threshold(filter),
        FilterOp::Lte => value.to_comparable_number() <= threshold(filter),
        FilterOp::Other(op) => {
            log::debug!("Unknown filter operator '{op}', letting record through");
            true
        }
    }
}

/// Keep the records that satisfy every filter (logical AND).
///
/// Filters on field ids that are no longer in the schema compare against the
/// raw stored value. Numeric operators compare as floats with empty values
/// reading as 0, so only text that is not a number never matches them.
pub fn apply_filters<'a, I>(
    records: I,
    filters: &[Filter],
    collection: &Collection,
    resolver: Option<&dyn CollectionResolver>,
) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    if filters.is_empty() {
        return records.into_iter().collect();
    }
    let fields: Vec<Option<&Field>> = filters
        .iter()
        .map(|f| collection.field(&f.field_id))
        .collect();
    records
        .into_iter()
        .filter(|record| {
            filters.iter().zip(&fields).all(|(filter, field)| {
                let value = query_value(record, *field, &filter.field_id, collection, resolver);
                matches_filter(&value, filter)
            })
        })
        .collect()
}

/// Sort records by the view's sort keys into a new vector; the input is never
/// reordered. Keys apply in order, the first non-equal comparison wins, and
/// full ties keep their original relative order.
pub fn apply_sorts<'a>(
    records: &[&'a Record],
    sorts: &[SortKey],
    collection: &Collection,
    resolver: Option<&dyn CollectionResolver>,
) -> Vec<&'a Record> {
    if sorts.is_empty() {
        return records.to_vec();
    }
    let fields: Vec<Option<&Field>> = sorts
        .iter()
        .map(|s| collection.field(&s.field_id))
        .collect();

    // Compute every sort key once per record, then order the indices.
    let keys: Vec<Vec<Value>> = records
        .iter()
        .map(|record| {
            sorts
                .iter()
                .zip(&fields)
                .map(|(sort, field)| match field {
                    Some(_) => query_value(record, *field, &sort.field_id, collection, resolver),
                    // unknown ids sort as empty text rather than null
                    None => match record.get(&sort.field_id) {
                        None | Some(Value::Null) => Value::Text(String::new()),
                        Some(v) => v.clone(),
                    },
                })
                .collect()
        })
        .collect();

    let mut order: Vec<usize> = (0..records.len()).collect();
    // `sort_by` is stable
    order.sort_by(|&a, &b| {
        for (i, sort) in sorts.iter().enumerate() {
            let ord = compare(&keys[a][i], &keys[b][i]);
            if ord != Ordering::Equal {
                return match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
            }
        }
        Ordering::Equal
    });
    order.into_iter().map(|i| records[i]).collect()
}

/// Fields shown by a view, in display order, without hidden ones.
pub fn visible_fields<'a>(schema: &'a [Field], view: &View) -> Vec<&'a Field> {
    let lookup = |id: &str| schema.iter().find(|f| f.id == id);
    let ordered: Vec<&Field> = match &view.field_order {
        Some(order) => order.iter().filter_map(|id| lookup(id.as_str())).collect(),
        None => schema.iter().collect(),
    };
    ordered
        .into_iter()
        .filter(|f| !view.hidden_fields.contains(&f.id))
        .collect()
}

/// Records of a collection as a view shows them: filtered, then sorted.
/// An unknown view id yields nothing.
pub fn view_records<'a>(
    collection: &'a Collection,
    view_id: &str,
    resolver: Option<&dyn CollectionResolver>,
) -> Vec<&'a Record> {
    let Some(view) = collection.view(view_id) else {
        return Vec::new();
    };
    let filtered = apply_filters(&collection.records, &view.filter, collection, resolver);
    apply_sorts(&filtered, &view.sort, collection, resolver)
}

/// Display text of one cell.
pub fn display_value(
    record: &Record,
    field_id: &str,
    collection: &Collection,
    resolver: Option<&dyn CollectionResolver>,
) -> String {
    let value = query_value(record, collection.field(field_id), field_id, collection, resolver);
    display_string(&value)
}

/// Title of a record: its first text field, or "Untitled".
pub fn record_title(record: &Record, schema: &[Field]) -> String {
    let title = schema
        .iter()
        .find(|f| matches!(f.kind, FieldKind::Text))
        .and_then(|f| record.get(&f.id));
    match title {
        None | Some(Value::Null) => "Untitled".to_string(),
        Some(Value::Text(s)) if s.is_empty() => "Untitled".to_string(),
        Some(value) => value.to_plain_string(),
    }
}
