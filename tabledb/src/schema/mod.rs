mod parser;
pub mod templates;
mod types;

pub use parser::{normalize_collection, parse_collection_str, parse_collection_yaml, to_json_string};
pub use types::*;
