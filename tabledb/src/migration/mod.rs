use crate::schema::{Collection, Field, FieldKind};
use crate::value::coerce;
use std::collections::HashSet;

/// A single change between two versions of a collection's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    FieldAdded {
        field: String,
        field_type: &'static str,
    },
    FieldRemoved {
        field: String,
    },
    FieldRetyped {
        field: String,
        from: &'static str,
        to: &'static str,
    },
    FieldRenamed {
        field: String,
        old_name: String,
        new_name: String,
    },
    OptionAdded {
        field: String,
        value: String,
    },
    OptionRemoved {
        field: String,
        value: String,
    },
}

impl SchemaChange {
    /// Whether applying this change can drop or rewrite stored values.
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            SchemaChange::FieldRemoved { .. }
                | SchemaChange::FieldRetyped { .. }
                | SchemaChange::OptionRemoved { .. }
        )
    }

    /// Human-readable description of this change.
    pub fn describe(&self) -> String {
        match self {
            SchemaChange::FieldAdded { field, field_type } => {
                format!("Field '{}' added ({})", field, field_type)
            }
            SchemaChange::FieldRemoved { field } => {
                format!("Field '{}' removed (values deleted)", field)
            }
            SchemaChange::FieldRetyped { field, from, to } => {
                format!("Field '{}' changed from {} to {} (values coerced)", field, from, to)
            }
            SchemaChange::FieldRenamed { field, old_name, new_name } => {
                format!("Field '{}' renamed: '{}' -> '{}'", field, old_name, new_name)
            }
            SchemaChange::OptionAdded { field, value } => {
                format!("Option '{}' added to '{}'", value, field)
            }
            SchemaChange::OptionRemoved { field, value } => {
                format!("Option '{}' removed from '{}' (WARNING)", value, field)
            }
        }
    }
}

/// Compare two field lists by field id and return the detected changes.
///
/// Additions, retypes, renames and option changes come in the order of `new`;
/// removals follow in the order of `old`.
pub fn diff_schemas(old: &[Field], new: &[Field]) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    for new_field in new {
        let Some(old_field) = old.iter().find(|f| f.id == new_field.id) else {
            changes.push(SchemaChange::FieldAdded {
                field: new_field.id.clone(),
                field_type: new_field.type_name(),
            });
            continue;
        };

        if old_field.name != new_field.name {
            changes.push(SchemaChange::FieldRenamed {
                field: new_field.id.clone(),
                old_name: old_field.name.clone(),
                new_name: new_field.name.clone(),
            });
        }

        if !old_field.kind.same_type(&new_field.kind) {
            changes.push(SchemaChange::FieldRetyped {
                field: new_field.id.clone(),
                from: old_field.type_name(),
                to: new_field.type_name(),
            });
            continue;
        }

        // Same type: option-bearing fields may have gained or lost options
        let old_options = old_field.options();
        let new_options = new_field.options();
        for value in new_options.iter().filter(|v| !old_options.contains(v)) {
            changes.push(SchemaChange::OptionAdded {
                field: new_field.id.clone(),
                value: value.clone(),
            });
        }
        for value in old_options.iter().filter(|v| !new_options.contains(v)) {
            changes.push(SchemaChange::OptionRemoved {
                field: new_field.id.clone(),
                value: value.clone(),
            });
        }
    }

    let new_ids: HashSet<&str> = new.iter().map(|f| f.id.as_str()).collect();
    for old_field in old.iter().filter(|f| !new_ids.contains(f.id.as_str())) {
        changes.push(SchemaChange::FieldRemoved {
            field: old_field.id.clone(),
        });
    }

    changes
}

/// Replace a collection's schema with `new_schema`, bringing records and views
/// along.
///
/// Values of removed fields are deleted from every record. A field that kept
/// its type keeps any value the record already has; every other field is set
/// through [`coerce`], which backfills new fields and converts retyped ones.
/// Views lose every reference to removed fields, `fieldOrder` gains the new
/// ids at the end, and kanban/gallery views whose grouping field is gone fall
/// back to the first select or status field. The stored schema is an
/// independent copy of `new_schema`.
///
/// Returns the changes that were applied.
pub fn migrate_schema(collection: &mut Collection, new_schema: &[Field]) -> Vec<SchemaChange> {
    let changes = diff_schemas(&collection.schema, new_schema);
    for change in &changes {
        log::info!("Collection '{}': {}", collection.id, change.describe());
    }

    let new_ids: HashSet<&str> = new_schema.iter().map(|f| f.id.as_str()).collect();

    for record in collection.records.iter_mut() {
        for old_field in &collection.schema {
            if !new_ids.contains(old_field.id.as_str()) {
                record.values.remove(&old_field.id);
            }
        }

        for field in new_schema {
            let unchanged = collection
                .schema
                .iter()
                .find(|f| f.id == field.id)
                .is_some_and(|old| old.kind.same_type(&field.kind));
            let previous = record.get(&field.id);
            if unchanged && previous.is_some() {
                continue;
            }
            let value = coerce(field, previous);
            record.set(field.id.clone(), value);
        }
    }

    let fallback_group_by = new_schema
        .iter()
        .find(|f| matches!(f.kind, FieldKind::Status(_) | FieldKind::Select(_)))
        .map(|f| f.id.clone());
    let exists = |id: &str| new_ids.contains(id);

    for view in collection.views.iter_mut() {
        view.sort.retain(|s| exists(s.field_id.as_str()));
        view.filter.retain(|f| exists(f.field_id.as_str()));
        view.hidden_fields.retain(|id| exists(id.as_str()));
        if let Some(fields) = view.card_fields.as_mut() {
            fields.retain(|id| exists(id.as_str()));
        }
        if view.card_cover_field.as_deref().is_some_and(|id| !exists(id)) {
            view.card_cover_field = None;
        }
        if let Some(order) = view.field_order.as_mut() {
            order.retain(|id| exists(id.as_str()));
            for field in new_schema {
                if !order.contains(&field.id) {
                    order.push(field.id.clone());
                }
            }
        }
        if let Some(widths) = view.column_widths.as_mut() {
            widths.retain(|id, _| exists(id.as_str()));
        }
        if view.view_type.is_grouped() && !view.group_by.as_deref().is_some_and(exists) {
            view.group_by = fallback_group_by.clone();
        }
    }

    // `Field: Clone` deep-copies options and colors
    collection.schema = new_schema.to_vec();
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        parse_collection_str, Choices, Filter, FilterOp, Record, SortDirection, SortKey, View,
        ViewType,
    };
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn tracker() -> Collection {
        parse_collection_str(
            r#"{
            "id": "tracker", "name": "Tracker",
            "schema": [
                { "id": "title", "name": "Title", "type": "text" },
                { "id": "done", "name": "Done", "type": "checkbox" },
                { "id": "stage", "name": "Stage", "type": "select", "options": ["a", "b"] },
                { "id": "points", "name": "Points", "type": "text" }
            ],
            "views": [
                { "id": "board", "name": "Kanban", "type": "kanban", "groupBy": "stage",
                  "cardCoverField": "stage", "cardFields": ["done", "title"],
                  "sort": [{ "fieldId": "stage", "direction": "asc" },
                           { "fieldId": "title", "direction": "desc" }],
                  "filter": [{ "fieldId": "stage", "op": "equals", "value": "a" }],
                  "hiddenFields": ["stage", "points"],
                  "fieldOrder": ["stage", "title", "done"],
                  "columnWidths": { "stage": 120, "title": 240 } }
            ],
            "records": [
                { "id": "r1", "title": "First", "done": true, "stage": "a", "points": "5" },
                { "id": "r2", "title": "Second", "stage": null }
            ]
        }"#,
        )
        .unwrap()
    }

    fn schema_without_stage() -> Vec<Field> {
        let mut schema = tracker().schema;
        schema.retain(|f| f.id != "stage");
        schema
    }

    #[test]
    fn test_diff_schemas() {
        let old = tracker().schema;
        let mut new = old.clone();
        new.retain(|f| f.id != "done");
        new[0].name = "Name".into();
        new[1].kind = FieldKind::Select(Choices::new(["b", "c"]));
        new[2].kind = FieldKind::Number;
        new.push(Field::new("due", "Due", FieldKind::Date));

        let changes = diff_schemas(&old, &new);
        assert_eq!(
            changes,
            vec![
                SchemaChange::FieldRenamed {
                    field: "title".into(),
                    old_name: "Title".into(),
                    new_name: "Name".into(),
                },
                SchemaChange::OptionAdded { field: "stage".into(), value: "c".into() },
                SchemaChange::OptionRemoved { field: "stage".into(), value: "a".into() },
                SchemaChange::FieldRetyped {
                    field: "points".into(),
                    from: "text",
                    to: "number",
                },
                SchemaChange::FieldAdded { field: "due".into(), field_type: "date" },
                SchemaChange::FieldRemoved { field: "done".into() },
            ]
        );
        assert!(diff_schemas(&old, &old).is_empty());
    }

    #[test]
    fn test_lossy_and_describe() {
        let removed = SchemaChange::FieldRemoved { field: "x".into() };
        let added = SchemaChange::FieldAdded { field: "y".into(), field_type: "number" };
        assert!(removed.is_lossy());
        assert!(!added.is_lossy());
        assert_eq!(added.describe(), "Field 'y' added (number)");
        assert_eq!(
            SchemaChange::FieldRetyped { field: "z".into(), from: "text", to: "number" }.describe(),
            "Field 'z' changed from text to number (values coerced)"
        );
    }

    #[test]
    fn test_checkbox_to_select_drops_true() {
        let mut db = tracker();
        let mut schema = db.schema.clone();
        schema[1].kind = FieldKind::Select(Choices::new(["yes", "no"]));

        let changes = migrate_schema(&mut db, &schema);
        assert_eq!(changes.len(), 1);
        assert_eq!(db.record("r1").and_then(|r| r.get("done")), Some(&Value::Null));
        // r2 never had the field; the backfill is null as well
        assert_eq!(db.record("r2").and_then(|r| r.get("done")), Some(&Value::Null));
        assert_eq!(db.field("done").map(|f| f.type_name()), Some("select"));
    }

    #[test]
    fn test_retype_coerces_and_same_type_keeps() {
        let mut db = tracker();
        let mut schema = db.schema.clone();
        schema[3].kind = FieldKind::Number;
        // same type with narrower options: stored value is left alone
        schema[2].kind = FieldKind::Select(Choices::new(["b"]));
        schema.push(Field::new("tags", "Tags", FieldKind::MultiSelect(Choices::default())));

        migrate_schema(&mut db, &schema);
        let r1 = db.record("r1").cloned().unwrap_or_else(|| Record::new("missing"));
        assert_eq!(r1.get("points"), Some(&Value::Number(5.0)));
        assert_eq!(r1.get("stage"), Some(&Value::from("a")));
        assert_eq!(r1.get("tags"), Some(&Value::Ids(vec![])));
        // present null survives when the type is unchanged
        assert_eq!(db.record("r2").and_then(|r| r.get("stage")), Some(&Value::Null));
        assert_eq!(db.record("r2").and_then(|r| r.get("points")), Some(&Value::Null));
    }

    #[test]
    fn test_removed_field_cleaned_everywhere() {
        let mut db = tracker();
        migrate_schema(&mut db, &schema_without_stage());

        for record in &db.records {
            assert!(record.get("stage").is_none(), "{} kept stage", record.id);
        }
        let view = &db.views[0];
        assert_eq!(
            view.sort,
            vec![SortKey { field_id: "title".into(), direction: SortDirection::Desc }]
        );
        assert!(view.filter.is_empty());
        assert_eq!(view.hidden_fields, vec!["points".to_string()]);
        assert_eq!(
            view.field_order,
            Some(vec!["title".to_string(), "done".to_string(), "points".to_string()])
        );
        assert_eq!(view.column_widths.as_ref().map(|w| w.len()), Some(1));
        assert_eq!(view.card_cover_field, None);
        assert_eq!(view.card_fields, Some(vec!["done".to_string(), "title".to_string()]));
        // no select or status field is left to group by
        assert_eq!(view.group_by, None);
    }

    #[test]
    fn test_group_by_falls_back_to_first_choice_field() {
        let mut db = tracker();
        db.views.push(View::new("table", "Table", ViewType::Table));
        let mut schema = schema_without_stage();
        schema.push(Field::new("phase", "Phase", FieldKind::Status(Choices::new(["Todo"]))));

        migrate_schema(&mut db, &schema);
        assert_eq!(db.views[0].group_by.as_deref(), Some("phase"));
        // table views are not grouped
        assert_eq!(db.views[1].group_by, None);
        assert_eq!(db.record("r1").and_then(|r| r.get("phase")), Some(&Value::Null));
    }

    #[test]
    fn test_schema_is_copied() {
        let mut db = tracker();
        let mut schema = db.schema.clone();
        migrate_schema(&mut db, &schema);

        schema[2].kind = FieldKind::Select(Choices::new(["changed"]));
        assert_eq!(
            db.field("stage").map(|f| f.options().to_vec()),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_unknown_view_filter_fields_are_dropped() {
        let mut db = tracker();
        db.views[0].filter.push(Filter {
            field_id: "ghost".into(),
            op: FilterOp::Contains,
            value: "x".into(),
        });
        let schema = db.schema.clone();
        migrate_schema(&mut db, &schema);
        assert_eq!(db.views[0].filter.len(), 1);
    }
}
