use crate::schema::{Collection, RelationConfig};
use std::collections::{BTreeMap, HashMap};

/// Looks up peer collections by id for cross-collection relations.
///
/// The engine only borrows what the resolver hands back for the duration of one
/// computation; the host owns the collections.
pub trait CollectionResolver {
    fn resolve(&self, id: &str) -> Option<&Collection>;
}

/// A resolver that can also hand out peers for mutation, used by backlink sync.
pub trait CollectionStore: CollectionResolver {
    fn resolve_mut(&mut self, id: &str) -> Option<&mut Collection>;
}

impl CollectionResolver for HashMap<String, Collection> {
    fn resolve(&self, id: &str) -> Option<&Collection> {
        self.get(id)
    }
}

impl CollectionStore for HashMap<String, Collection> {
    fn resolve_mut(&mut self, id: &str) -> Option<&mut Collection> {
        self.get_mut(id)
    }
}

impl CollectionResolver for BTreeMap<String, Collection> {
    fn resolve(&self, id: &str) -> Option<&Collection> {
        self.get(id)
    }
}

impl CollectionStore for BTreeMap<String, Collection> {
    fn resolve_mut(&mut self, id: &str) -> Option<&mut Collection> {
        self.get_mut(id)
    }
}

impl CollectionResolver for [Collection] {
    fn resolve(&self, id: &str) -> Option<&Collection> {
        self.iter().find(|c| c.id == id)
    }
}

impl CollectionResolver for Vec<Collection> {
    fn resolve(&self, id: &str) -> Option<&Collection> {
        self.as_slice().resolve(id)
    }
}

impl CollectionStore for Vec<Collection> {
    fn resolve_mut(&mut self, id: &str) -> Option<&mut Collection> {
        self.iter_mut().find(|c| c.id == id)
    }
}

/// The collection a relation points into.
///
/// Falls back to `collection` itself when the relation has no target, no
/// resolver was supplied, or the resolver does not know the target id.
pub fn resolve_target<'a>(
    collection: &'a Collection,
    relation: &RelationConfig,
    resolver: Option<&'a dyn CollectionResolver>,
) -> &'a Collection {
    match (relation.target_collection_id.as_deref(), resolver) {
        (Some(target_id), Some(resolver)) => resolver.resolve(target_id).unwrap_or(collection),
        _ => collection,
    }
}
