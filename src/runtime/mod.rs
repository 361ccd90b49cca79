//! Runtime loading of entity declarations.
//!
//! Entity types can be declared from a YAML schema instead of Rust code, and
//! query strings decoded for [`Model::recover`](crate::Model::recover).

pub mod query;
pub mod schema_loader;

// Re-export key types
pub use query::parse_query;
pub use schema_loader::{
    compute_declaration_order, AttributeDef, EntityDef, OneOrMany, Schema, SchemaConfig,
    SchemaSettings, TargetDef,
};
