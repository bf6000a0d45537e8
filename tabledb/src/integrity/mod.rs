//! Relation maintenance across collections.
//!
//! `infer_implicit_targets` fills in missing relation targets from field and
//! collection names. `sync_backlinks` mirrors a collection's outgoing links
//! into the reciprocal fields of the collections it points at. Both are
//! best-effort: anything they cannot resolve is skipped.

use crate::resolver::CollectionStore;
use crate::schema::{Collection, FieldKind};
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Lowercased, alphanumerics only, one trailing "s" dropped.
/// `"Projects"` and `"project"` normalize to the same token.
fn normalize_token(value: &str) -> String {
    let mut token: String = value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if token.ends_with('s') {
        token.pop();
    }
    token
}

fn infer_target<'a>(
    field_name: &str,
    source_name: &str,
    peers: &[&'a Collection],
) -> Option<&'a Collection> {
    let relation_token = normalize_token(field_name);
    if relation_token.is_empty() {
        return None;
    }
    let source_token = normalize_token(source_name);
    let tokens: Vec<(String, &Collection)> =
        peers.iter().map(|peer| (normalize_token(&peer.name), *peer)).collect();

    let exact = tokens.iter().find(|(token, _)| *token == relation_token);
    let contains = || tokens.iter().find(|(token, _)| token.contains(&relation_token));
    let contained = || {
        tokens
            .iter()
            .find(|(token, _)| !token.is_empty() && relation_token.contains(token.as_str()))
    };
    if let Some((_, peer)) = exact.or_else(contains).or_else(contained) {
        return Some(*peer);
    }

    let named = |needle: &str| {
        tokens
            .iter()
            .find(|(token, _)| token.contains(needle))
            .map(|(_, peer)| *peer)
    };
    if relation_token.contains("project") {
        return named("project");
    }
    if source_token.contains("project") && relation_token.contains("task") {
        return named("task");
    }
    None
}

/// Point relation fields that have no target at a peer collection guessed
/// from the field's name, and wire up the reciprocal field when the peer has
/// a relation field named after this collection.
///
/// Fields that already have a target are never touched. Returns whether any
/// field changed so the caller knows to persist.
pub fn infer_implicit_targets<'a, I>(collection: &mut Collection, peers: I) -> bool
where
    I: IntoIterator<Item = &'a Collection>,
{
    let peers: Vec<&Collection> = peers.into_iter().filter(|p| p.id != collection.id).collect();
    let source_name = collection.name.clone();
    let source_token = normalize_token(&source_name);
    let mut changed = false;

    for field in collection.schema.iter_mut() {
        let field_name = field.name.clone();
        let Some(relation) = field.relation_mut() else {
            continue;
        };
        if relation.target_collection_id.is_some() {
            continue;
        }
        let Some(target) = infer_target(&field_name, &source_name, &peers) else {
            continue;
        };

        log::info!(
            "Relation field '{}' in '{}' now targets '{}'",
            field_name,
            source_name,
            target.name
        );
        relation.target_collection_id = Some(target.id.clone());
        changed = true;

        if relation.target_relation_field_id.is_none() && !source_token.is_empty() {
            let backlink = target.schema.iter().find(|f| {
                matches!(f.kind, FieldKind::Relation { .. })
                    && normalize_token(&f.name).contains(&source_token)
            });
            if let Some(backlink) = backlink {
                log::info!("Wired '{}' as backlink of '{}'", backlink.name, field_name);
                relation.target_relation_field_id = Some(backlink.id.clone());
            }
        }
    }

    changed
}

/// Reconcile one target collection's reciprocal field against the expected
/// inbound links. Only ids in `source_ids` are added or removed.
fn reconcile(
    target: &mut Collection,
    reciprocal_id: &str,
    inbound: &HashMap<String, HashSet<String>>,
    source_ids: &[String],
) -> bool {
    let is_relation = target
        .field(reciprocal_id)
        .is_some_and(|f| matches!(f.kind, FieldKind::Relation { .. }));
    if !is_relation {
        return false;
    }

    let empty = HashSet::new();
    let mut any_changed = false;
    for record in target.records.iter_mut() {
        let expected = inbound.get(&record.id).unwrap_or(&empty);
        let mut links: Vec<String> = Vec::new();
        for id in record.linked_ids(reciprocal_id) {
            if !links.contains(id) {
                links.push(id.clone());
            }
        }

        let mut changed = false;
        for source_id in source_ids {
            let should_link = expected.contains(source_id);
            let position = links.iter().position(|id| id == source_id);
            match (should_link, position) {
                (true, None) => {
                    links.push(source_id.clone());
                    changed = true;
                }
                (false, Some(i)) => {
                    links.remove(i);
                    changed = true;
                }
                _ => {}
            }
        }

        if changed {
            record.set(reciprocal_id, Value::Ids(links));
            any_changed = true;
        }
    }
    any_changed
}

/// Mirror `source`'s relation links into the reciprocal fields of their
/// target collections.
///
/// Only relation fields with both a target and a reciprocal field take part.
/// A target id equal to `source.id` refers to `source` itself, not to any
/// copy held by `store`. Propagation stops after one hop: rewritten targets
/// are not synced in turn.
///
/// Returns the ids of the collections whose records changed, each once, in
/// the order they were first changed.
pub fn sync_backlinks(source: &mut Collection, store: &mut dyn CollectionStore) -> Vec<String> {
    let pairs: Vec<(String, String, String)> = source
        .schema
        .iter()
        .filter_map(|field| {
            let relation = field.relation()?;
            Some((
                field.id.clone(),
                relation.target_collection_id.clone()?,
                relation.target_relation_field_id.clone()?,
            ))
        })
        .collect();
    if pairs.is_empty() {
        return Vec::new();
    }

    let source_ids: Vec<String> = source.records.iter().map(|r| r.id.clone()).collect();
    let mut changed_ids: Vec<String> = Vec::new();

    for (field_id, target_id, reciprocal_id) in pairs {
        let mut inbound: HashMap<String, HashSet<String>> = HashMap::new();
        for record in &source.records {
            for linked in record.linked_ids(&field_id) {
                inbound
                    .entry(linked.clone())
                    .or_default()
                    .insert(record.id.clone());
            }
        }

        let target = if target_id == source.id {
            Some(&mut *source)
        } else {
            store.resolve_mut(&target_id)
        };
        let Some(target) = target else {
            log::debug!("Backlink target '{target_id}' of '{field_id}' not found, skipping");
            continue;
        };

        let changed = reconcile(target, &reciprocal_id, &inbound, &source_ids);
        if changed && !changed_ids.contains(&target_id) {
            changed_ids.push(target_id);
        }
    }

    log::debug!(
        "Backlink sync from '{}' rewrote {} collection(s)",
        source.id,
        changed_ids.len()
    );
    changed_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Record, RelationConfig};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn relation(id: &str, name: &str, target: Option<&str>, reciprocal: Option<&str>) -> Field {
        Field::new(
            id,
            name,
            FieldKind::Relation {
                relation: RelationConfig {
                    target_collection_id: target.map(str::to_string),
                    target_relation_field_id: reciprocal.map(str::to_string),
                },
            },
        )
    }

    fn target_of(collection: &Collection, field_id: &str) -> (Option<String>, Option<String>) {
        let relation = collection
            .field(field_id)
            .and_then(|f| f.relation())
            .cloned()
            .unwrap_or_default();
        (relation.target_collection_id, relation.target_relation_field_id)
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Projects"), "project");
        assert_eq!(normalize_token("My Task-List!"), "mytasklist");
        assert_eq!(normalize_token("Status"), "statu");
        assert_eq!(normalize_token("??"), "");
    }

    #[test]
    fn test_infers_exact_name_and_backlink() {
        let mut tasks = Collection::new("t", "Tasks");
        tasks.schema.push(relation("proj", "Project", None, None));
        let mut projects = Collection::new("p", "Projects");
        projects.schema.push(relation("task_links", "Tasks", None, None));

        assert!(infer_implicit_targets(&mut tasks, [&projects]));
        assert_eq!(
            target_of(&tasks, "proj"),
            (Some("p".to_string()), Some("task_links".to_string()))
        );
    }

    #[test]
    fn test_substring_match_in_either_direction() {
        let people = Collection::new("people", "People");
        let clients = Collection::new("clients", "Key Clients");

        let mut a = Collection::new("a", "Deals");
        a.schema.push(relation("owner", "Client", None, None));
        assert!(infer_implicit_targets(&mut a, [&people, &clients]));
        assert_eq!(target_of(&a, "owner").0.as_deref(), Some("clients"));

        let mut b = Collection::new("b", "Deals");
        b.schema.push(relation("contact", "People contacts", None, None));
        assert!(infer_implicit_targets(&mut b, [&clients, &people]));
        assert_eq!(target_of(&b, "contact").0.as_deref(), Some("people"));
    }

    #[test]
    fn test_project_source_links_task_field() {
        let backlog = Collection::new("backlog", "Sprint tasks");
        let mut projects = Collection::new("p", "Projects");
        projects.schema.push(relation("work", "Task items", None, None));

        assert!(infer_implicit_targets(&mut projects, [&backlog]));
        assert_eq!(target_of(&projects, "work").0.as_deref(), Some("backlog"));
    }

    #[test]
    fn test_never_overwrites_configured_target() {
        let projects = Collection::new("p", "Projects");
        let mut tasks = Collection::new("t", "Tasks");
        tasks.schema.push(relation("proj", "Project", Some("elsewhere"), None));

        assert!(!infer_implicit_targets(&mut tasks, [&projects]));
        assert_eq!(target_of(&tasks, "proj"), (Some("elsewhere".to_string()), None));
    }

    #[test]
    fn test_no_match_and_self_excluded() {
        let mut tasks = Collection::new("t", "Tasks");
        tasks.schema.push(relation("blocked", "Blocked by", None, None));
        tasks.schema.push(relation("sub", "Tasks", None, None));
        let copy = tasks.clone();

        assert!(!infer_implicit_targets(&mut tasks, [&copy]));
        assert_eq!(target_of(&tasks, "sub").0, None);
    }

    fn linked(collection: &Collection, record_id: &str, field_id: &str) -> Vec<String> {
        collection
            .record(record_id)
            .map(|r| r.linked_ids(field_id).to_vec())
            .unwrap_or_default()
    }

    fn tasks_and_projects() -> (Collection, BTreeMap<String, Collection>) {
        let mut tasks = Collection::new("tasks", "Tasks");
        tasks.schema.push(relation("project", "Project", Some("projects"), Some("tasks")));
        tasks.records = vec![
            Record::new("t1").with("project", vec!["p1"]),
            Record::new("t2").with("project", vec!["p1", "p2"]),
            Record::new("t3"),
        ];

        let mut projects = Collection::new("projects", "Projects");
        projects.schema.push(relation("tasks", "Tasks", Some("tasks"), Some("project")));
        projects.schema.push(relation("notes", "Notes", Some("notes"), None));
        projects.records = vec![
            Record::new("p1").with("tasks", vec!["stale", "t3"]),
            Record::new("p2").with("tasks", vec!["n9"]),
            Record::new("p3"),
        ];

        let mut store = BTreeMap::new();
        store.insert(projects.id.clone(), projects);
        (tasks, store)
    }

    #[test]
    fn test_sync_adds_and_removes_only_source_ids() {
        let (mut tasks, mut store) = tasks_and_projects();
        let changed = sync_backlinks(&mut tasks, &mut store);
        assert_eq!(changed, vec!["projects".to_string()]);

        let projects = &store["projects"];
        // "stale" is not a task id, so it is left alone
        assert_eq!(linked(projects, "p1", "tasks"), vec!["stale", "t1", "t2"]);
        assert_eq!(linked(projects, "p2", "tasks"), vec!["n9", "t2"]);
        assert_eq!(projects.record("p3").and_then(|r| r.get("tasks")), None);
    }

    #[test]
    fn test_sync_is_idempotent_and_removes_dropped_links() {
        let (mut tasks, mut store) = tasks_and_projects();
        sync_backlinks(&mut tasks, &mut store);
        assert!(sync_backlinks(&mut tasks, &mut store).is_empty());

        if let Some(t2) = tasks.record_mut("t2") {
            t2.set("project", Value::Ids(vec!["p2".into()]));
        }
        assert_eq!(sync_backlinks(&mut tasks, &mut store), vec!["projects".to_string()]);
        assert_eq!(linked(&store["projects"], "p1", "tasks"), vec!["stale", "t1"]);
        assert_eq!(linked(&store["projects"], "p2", "tasks"), vec!["n9", "t2"]);
    }

    #[test]
    fn test_sync_skips_missing_target_and_non_relation_reciprocal() {
        let mut source = Collection::new("a", "A");
        source.schema.push(relation("x", "X", Some("missing"), Some("y")));
        source.schema.push(relation("z", "Z", Some("b"), Some("title")));
        source.records = vec![Record::new("a1").with("x", vec!["b1"]).with("z", vec!["b1"])];

        let mut b = Collection::new("b", "B");
        b.schema.push(Field::new("title", "Title", FieldKind::Text));
        b.records = vec![Record::new("b1").with("title", "first")];
        let mut store = vec![b];

        assert!(sync_backlinks(&mut source, &mut store).is_empty());
        assert_eq!(store[0].record("b1").and_then(|r| r.get("title")), Some(&Value::from("first")));
    }

    #[test]
    fn test_self_relation_syncs_into_source() {
        let mut people = Collection::new("people", "People");
        people.schema.push(relation("mentors", "Mentors", Some("people"), Some("mentees")));
        people.schema.push(relation("mentees", "Mentees", Some("people"), Some("mentors")));
        people.records = vec![Record::new("ada").with("mentors", vec!["bob"]), Record::new("bob")];

        // a stale copy in the store must not be the one written
        let mut store = vec![people.clone()];
        let changed = sync_backlinks(&mut people, &mut store);

        assert_eq!(changed, vec!["people".to_string()]);
        assert_eq!(linked(&people, "bob", "mentees"), vec!["ada"]);
        assert!(linked(&store[0], "bob", "mentees").is_empty());
    }
}
