use super::types::{Collection, ViewType};
use crate::error::Result;

/// Parse a collection document from its JSON form and normalize it.
pub fn parse_collection_str(content: &str) -> Result<Collection> {
    let mut collection: Collection = serde_json::from_str(content)?;
    normalize_collection(&mut collection);
    Ok(collection)
}

/// Parse a collection document written as YAML and normalize it.
pub fn parse_collection_yaml(content: &str) -> Result<Collection> {
    let mut collection: Collection = serde_yaml::from_str(content)?;
    normalize_collection(&mut collection);
    Ok(collection)
}

/// Serialize a collection as pretty-printed JSON.
pub fn to_json_string(collection: &Collection) -> Result<String> {
    Ok(serde_json::to_string_pretty(collection)?)
}

/// Fix up legacy documents. Missing arrays are already defaulted by serde;
/// old kanban views named "Board" are renamed "Kanban".
/// Returns whether anything changed.
pub fn normalize_collection(collection: &mut Collection) -> bool {
    let mut changed = false;
    for view in &mut collection.views {
        if view.view_type == ViewType::Kanban && view.name.eq_ignore_ascii_case("board") {
            log::warn!(
                "Renaming legacy kanban view '{}' in collection '{}'",
                view.id,
                collection.id
            );
            view.name = "Kanban".to_string();
            changed = true;
        }
    }
    changed
}
