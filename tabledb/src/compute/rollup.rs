use crate::resolver::{resolve_target, CollectionResolver};
use crate::schema::{Aggregation, Collection, Record, RollupConfig};
use std::collections::HashSet;

/// Aggregate a property of the records linked through a relation field.
///
/// Returns `None` for "no data": missing relation field, no linked records
/// found (except `count`, which is 0), or no finite values to aggregate.
pub fn compute_rollup(
    record: &Record,
    config: &RollupConfig,
    collection: &Collection,
    resolver: Option<&dyn CollectionResolver>,
) -> Option<f64> {
    let relation_field = collection.field(&config.relation_field_id)?;
    let relation = relation_field.relation()?;
    let target = resolve_target(collection, relation, resolver);

    let linked_ids: HashSet<&str> = record
        .linked_ids(&relation_field.id)
        .iter()
        .map(String::as_str)
        .collect();
    // Ids missing from the target are dropped silently.
    let linked: Vec<&Record> = target
        .records
        .iter()
        .filter(|candidate| linked_ids.contains(candidate.id.as_str()))
        .collect();

    if linked.is_empty() {
        return (config.aggregation == Aggregation::Count).then_some(0.0);
    }

    match config.aggregation {
        Aggregation::Count => Some(linked.len() as f64),
        Aggregation::CountNotEmpty => {
            let Some(target_field) = config.target_field_id.as_deref() else {
                return Some(0.0);
            };
            let filled = linked
                .iter()
                .filter(|r| r.get(target_field).is_some_and(|v| !v.is_empty()))
                .count();
            Some(filled as f64)
        }
        Aggregation::Sum | Aggregation::Avg | Aggregation::Min | Aggregation::Max => {
            let target_field = config.target_field_id.as_deref()?;
            let nums: Vec<f64> = linked
                .iter()
                .filter_map(|r| r.get(target_field))
                .map(|v| v.to_number())
                .filter(|n| n.is_finite())
                .collect();
            if nums.is_empty() {
                return None;
            }
            let sum: f64 = nums.iter().sum();
            Some(match config.aggregation {
                Aggregation::Sum => sum,
                Aggregation::Avg => sum / nums.len() as f64,
                Aggregation::Min => nums.iter().copied().fold(f64::INFINITY, f64::min),
                _ => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldKind, RelationConfig};
    use crate::value::Value;
    use std::collections::HashMap;

    fn rollup(aggregation: Aggregation, target: Option<&str>) -> RollupConfig {
        RollupConfig {
            relation_field_id: "items".into(),
            target_field_id: target.map(str::to_string),
            aggregation,
        }
    }

    /// Rollup of the first order against the items collection.
    fn first_order(
        orders: &Collection,
        peers: &HashMap<String, Collection>,
        config: &RollupConfig,
    ) -> Option<f64> {
        compute_rollup(&orders.records[0], config, orders, Some(peers))
    }

    /// Orders (source) link to line items stored in a separate collection.
    fn fixture() -> (Collection, HashMap<String, Collection>) {
        let mut orders = Collection::new("orders", "Orders");
        orders.schema = vec![
            Field::new(
                "items",
                "Items",
                FieldKind::Relation {
                    relation: RelationConfig {
                        target_collection_id: Some("items".into()),
                        target_relation_field_id: None,
                    },
                },
            ),
            Field::new("label", "Label", FieldKind::Text),
        ];
        orders.records = vec![
            Record::new("o1").with("items", vec!["i1", "i2", "i3", "ghost"]),
            Record::new("o2").with("items", Vec::<String>::new()),
            Record::new("o3"),
        ];

        let mut items = Collection::new("items", "Items");
        items.records = vec![
            Record::new("i1").with("price", 2).with("note", "x"),
            Record::new("i2").with("price", Value::Null).with("note", ""),
            Record::new("i3").with("price", "x").with("note", vec!["a"]),
        ];

        let mut peers = HashMap::new();
        peers.insert(items.id.clone(), items);
        (orders, peers)
    }

    #[test]
    fn test_count_drops_unknown_ids() {
        let (orders, peers) = fixture();
        let r = first_order(&orders, &peers, &rollup(Aggregation::Count, None));
        assert_eq!(r, Some(3.0));
    }

    #[test]
    fn test_sum_ignores_non_numeric() {
        let (orders, peers) = fixture();
        let r = first_order(&orders, &peers, &rollup(Aggregation::Sum, Some("price")));
        assert_eq!(r, Some(2.0));
        let avg = first_order(&orders, &peers, &rollup(Aggregation::Avg, Some("price")));
        assert_eq!(avg, Some(2.0));
    }

    #[test]
    fn test_empty_links_count_zero_but_sum_null() {
        let (orders, peers) = fixture();
        for record in &orders.records[1..] {
            assert_eq!(
                compute_rollup(record, &rollup(Aggregation::Count, None), &orders, Some(&peers)),
                Some(0.0)
            );
            for agg in [Aggregation::Sum, Aggregation::Avg, Aggregation::Min, Aggregation::Max] {
                assert_eq!(
                    compute_rollup(record, &rollup(agg, Some("price")), &orders, Some(&peers)),
                    None
                );
            }
        }
    }

    #[test]
    fn test_count_not_empty() {
        let (orders, peers) = fixture();
        let r = first_order(&orders, &peers, &rollup(Aggregation::CountNotEmpty, Some("note")));
        assert_eq!(r, Some(2.0));
        let unconfigured = first_order(&orders, &peers, &rollup(Aggregation::CountNotEmpty, None));
        assert_eq!(unconfigured, Some(0.0));
    }

    #[test]
    fn test_min_max() {
        let (mut orders, mut peers) = fixture();
        let items = peers.get_mut("items").unwrap();
        items.records[1].set("price", Value::Number(-4.0));
        orders.records[0].set("items", Value::from(vec!["i1", "i2"]));
        let min = first_order(&orders, &peers, &rollup(Aggregation::Min, Some("price")));
        let max = first_order(&orders, &peers, &rollup(Aggregation::Max, Some("price")));
        assert_eq!((min, max), (Some(-4.0), Some(2.0)));
    }

    #[test]
    fn test_missing_relation_field_is_null() {
        let (orders, peers) = fixture();
        let mut config = rollup(Aggregation::Count, None);
        config.relation_field_id = "label".into();
        assert_eq!(first_order(&orders, &peers, &config), None);
        config.relation_field_id = "nope".into();
        assert_eq!(first_order(&orders, &peers, &config), None);
    }

    #[test]
    fn test_without_resolver_uses_own_collection() {
        let (orders, _) = fixture();
        // none of i1..i3 live in orders itself
        let count = rollup(Aggregation::Count, None);
        let r = compute_rollup(&orders.records[0], &count, &orders, None);
        assert_eq!(r, Some(0.0));
    }
}
