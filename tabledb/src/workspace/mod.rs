//! In-memory host for a set of collections.
//!
//! The workspace owns every collection, resolves relation targets between
//! them and runs the save lifecycle: persist the collection, mirror its links
//! into the reciprocal fields of its targets, then persist each rewritten
//! target once.

mod sink;

pub use sink::{CollectionSink, DirectorySink, NullSink, DOCUMENT_SUFFIX};

use crate::compute::value_of;
use crate::error::{Result, TableDbError};
use crate::integrity::{infer_implicit_targets, sync_backlinks};
use crate::migration::{migrate_schema, SchemaChange};
use crate::query;
use crate::resolver::{CollectionResolver, CollectionStore};
use crate::schema::templates::{duplicate_collection, template_for};
use crate::schema::{Collection, Field, Record};
use crate::value::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub struct Workspace {
    collections: BTreeMap<String, Collection>,
    sink: Box<dyn CollectionSink>,
}

impl Default for Workspace {
    fn default() -> Self {
        Workspace::new()
    }
}

impl Workspace {
    /// An empty workspace that keeps everything in memory.
    pub fn new() -> Self {
        Workspace::with_sink(NullSink)
    }

    pub fn with_sink(sink: impl CollectionSink + 'static) -> Self {
        Workspace {
            collections: BTreeMap::new(),
            sink: Box::new(sink),
        }
    }

    /// Open a directory of `*.db.json` documents. Saves are written back into
    /// the same directory.
    pub fn open_dir(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        if !root.is_dir() {
            return Err(TableDbError::Other(format!(
                "Workspace directory does not exist: {}",
                root.display()
            )));
        }
        let mut sink = DirectorySink::new(root);
        let loaded = sink.load_all()?;
        log::debug!("Loaded {} collection(s) from {}", loaded.len(), root.display());

        let mut workspace = Workspace::with_sink(sink);
        for collection in loaded {
            if let Some(previous) = workspace.insert(collection) {
                log::warn!("Collection id '{}' appears twice, keeping the last", previous.id);
            }
        }
        Ok(workspace)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub fn get(&self, id: &str) -> Result<&Collection> {
        self.collections.get(id).ok_or_else(|| not_found(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Collection> {
        self.collections.get_mut(id).ok_or_else(|| not_found(id))
    }

    /// Add or replace a collection without persisting anything.
    pub fn insert(&mut self, collection: Collection) -> Option<Collection> {
        self.collections.insert(collection.id.clone(), collection)
    }

    pub fn remove(&mut self, id: &str) -> Result<Collection> {
        self.collections.remove(id).ok_or_else(|| not_found(id))
    }

    /// Create a collection from the starter template matching `name` and
    /// persist it. Returns the new id.
    pub fn create(&mut self, name: &str) -> Result<String> {
        let collection = template_for(name);
        let id = collection.id.clone();
        self.sink.persist(&collection)?;
        log::info!("Created collection '{}' ({})", name, id);
        self.insert(collection);
        Ok(id)
    }

    /// Copy a collection under a fresh id and persist the copy.
    pub fn duplicate(&mut self, id: &str) -> Result<String> {
        let copy = duplicate_collection(self.get(id)?);
        let copy_id = copy.id.clone();
        self.sink.persist(&copy)?;
        self.insert(copy);
        Ok(copy_id)
    }

    /// Persist a collection already in the workspace, then sync its backlinks.
    ///
    /// A failure to persist the collection itself is returned and nothing else
    /// happens. Targets rewritten by the sync are persisted once each; a
    /// failure there is logged and the remaining targets are still written.
    /// Returns the ids of the rewritten targets.
    pub fn save(&mut self, id: &str) -> Result<Vec<String>> {
        let mut source = self.remove(id)?;
        if let Err(e) = self.sink.persist(&source) {
            self.insert(source);
            return Err(e);
        }

        let changed = sync_backlinks(&mut source, &mut self.collections);
        self.insert(source);

        for changed_id in &changed {
            let Some(target) = self.collections.get(changed_id) else {
                continue;
            };
            if let Err(e) = self.sink.persist(target) {
                log::warn!("Failed to write backlinks to '{}': {}", changed_id, e);
            }
        }
        Ok(changed)
    }

    /// Insert or replace `collection`, then [`save`](Self::save) it.
    pub fn save_collection(&mut self, collection: Collection) -> Result<Vec<String>> {
        let id = collection.id.clone();
        self.insert(collection);
        self.save(&id)
    }

    /// Migrate a collection to `new_schema` and save it.
    pub fn migrate(&mut self, id: &str, new_schema: &[Field]) -> Result<Vec<SchemaChange>> {
        let changes = migrate_schema(self.get_mut(id)?, new_schema);
        self.save(id)?;
        Ok(changes)
    }

    /// Guess missing relation targets of a collection from the other
    /// collections' names; saves it when anything was filled in.
    pub fn infer_relations(&mut self, id: &str) -> Result<bool> {
        let mut collection = self.remove(id)?;
        let changed = infer_implicit_targets(&mut collection, self.collections.values());
        self.insert(collection);
        if changed {
            self.save(id)?;
        }
        Ok(changed)
    }

    /// Records of a collection as one of its views shows them.
    pub fn view_records(&self, collection_id: &str, view_id: &str) -> Result<Vec<&Record>> {
        let collection = self.get(collection_id)?;
        if collection.view(view_id).is_none() {
            return Err(TableDbError::NotFound {
                kind: "view",
                id: view_id.to_string(),
            });
        }
        Ok(query::view_records(collection, view_id, Some(self)))
    }

    /// Current value of one cell, computed fields included.
    pub fn value(&self, collection_id: &str, record_id: &str, field_id: &str) -> Result<Value> {
        let collection = self.get(collection_id)?;
        let record = collection.record(record_id).ok_or_else(|| TableDbError::NotFound {
            kind: "record",
            id: record_id.to_string(),
        })?;
        let field = collection.field(field_id).ok_or_else(|| TableDbError::NotFound {
            kind: "field",
            id: field_id.to_string(),
        })?;
        Ok(value_of(record, field, collection, Some(self)))
    }
}

impl CollectionResolver for Workspace {
    fn resolve(&self, id: &str) -> Option<&Collection> {
        self.collections.get(id)
    }
}

impl CollectionStore for Workspace {
    fn resolve_mut(&mut self, id: &str) -> Option<&mut Collection> {
        self.collections.get_mut(id)
    }
}

fn not_found(id: &str) -> TableDbError {
    TableDbError::NotFound {
        kind: "collection",
        id: id.to_string(),
    }
}
