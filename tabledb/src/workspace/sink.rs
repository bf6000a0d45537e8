use crate::error::{Result, TableDbError};
use crate::schema::{parse_collection_str, to_json_string, Collection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File suffix of collection documents on disk.
pub const DOCUMENT_SUFFIX: &str = ".db.json";

/// Where a workspace writes collections after they change.
pub trait CollectionSink {
    fn persist(&mut self, collection: &Collection) -> Result<()>;
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CollectionSink for NullSink {
    fn persist(&mut self, _collection: &Collection) -> Result<()> {
        Ok(())
    }
}

impl<F> CollectionSink for F
where
    F: FnMut(&Collection) -> Result<()>,
{
    fn persist(&mut self, collection: &Collection) -> Result<()> {
        self(collection)
    }
}

/// Writes each collection as pretty JSON to `<root>/<slug-of-name>.db.json`.
///
/// A collection keeps the file it was loaded from or first written to, so
/// renaming it does not move the document.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    paths: HashMap<String, PathBuf>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySink {
            root: root.into(),
            paths: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every `*.db.json` document under the root. Documents that fail to
    /// read or parse are logged and skipped.
    pub fn load_all(&mut self) -> Result<Vec<Collection>> {
        let pattern = self.root.join(format!("*{DOCUMENT_SUFFIX}"));
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern)
            .map_err(|e| TableDbError::Other(format!("Bad glob pattern: {e}")))?;

        let mut collections = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };
            let loaded = std::fs::read_to_string(&path)
                .map_err(Into::into)
                .and_then(|content| parse_collection_str(&content));
            match loaded {
                Ok(collection) => {
                    self.paths.insert(collection.id.clone(), path);
                    collections.push(collection);
                }
                Err(e) => log::warn!("Failed to load collection {}: {}", path.display(), e),
            }
        }
        Ok(collections)
    }

    fn path_for(&mut self, collection: &Collection) -> PathBuf {
        if let Some(path) = self.paths.get(&collection.id) {
            return path.clone();
        }
        let mut stem = slug::slugify(&collection.name);
        if stem.is_empty() {
            stem = "untitled".to_string();
        }
        let mut path = self.root.join(format!("{stem}{DOCUMENT_SUFFIX}"));
        let taken = |p: &Path| p.exists() || self.paths.values().any(|known| known == p);
        let mut n = 2;
        while taken(&path) {
            path = self.root.join(format!("{stem}-{n}{DOCUMENT_SUFFIX}"));
            n += 1;
        }
        self.paths.insert(collection.id.clone(), path.clone());
        path
    }
}

impl CollectionSink for DirectorySink {
    fn persist(&mut self, collection: &Collection) -> Result<()> {
        let path = self.path_for(collection);
        let content = to_json_string(collection)?;
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(&path, content)?;
        log::debug!("Wrote collection '{}' to {}", collection.id, path.display());
        Ok(())
    }
}
