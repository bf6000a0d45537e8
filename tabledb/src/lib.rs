pub mod schema;
pub mod value;
pub mod resolver;
pub mod compute;
pub mod query;
pub mod integrity;
pub mod migration;
pub mod validation;
pub mod workspace;
pub mod error;

pub use error::{Result, TableDbError};
pub use resolver::{CollectionResolver, CollectionStore};
pub use schema::{Collection, Field, FieldKind, Record, View};
pub use value::Value;
pub use workspace::Workspace;
