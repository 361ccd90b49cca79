//! # modelmap: declarative entity mapping
//!
//! modelmap attaches per-attribute rules to entity types and uses them to move
//! data between loosely shaped records (JSON bodies, query strings) and typed
//! entity instances.
//!
//! ## Features
//!
//! - **Rule registry**: ordered attribute rules per entity type, shared through `Arc`
//! - **Four conversions**: `parse` (checked), `merge` (trusted), `recover`
//!   (from query strings) and `reverse` (to output records)
//! - **Inheritance**: template fields always inherited, rules on composition
//! - **Pluggable violations**: fail fast by default, or log and continue
//! - **YAML schemas**: declare entities without Rust code (see [`runtime`])
//!
//! ## Example
//!
//! ```
//! use modelmap::decorators::{from, to_key, ty};
//! use modelmap::{EntityKey, FieldValue, Model, Storage, ValueType};
//! use serde_json::json;
//!
//! let user = EntityKey::dynamic("User");
//! let mut storage = Storage::new();
//! storage
//!     .entity(&user)
//!     .declare("age", [from("profile.age"), ty(ValueType::Number)])
//!     .declare("id", [to_key("id"), ty(ValueType::Number)]);
//! let storage = storage.into_shared();
//!
//! let source = json!({"id": 1, "profile": {"age": 30}}).into();
//! let model = Model::new(&storage, &user, Some(&source)).unwrap();
//! assert_eq!(model.reverse()["id"], FieldValue::Int(1));
//! ```

// Core modules
pub mod coerce;
pub mod compose;
pub mod config;
pub mod decorators;
pub mod entity;
pub mod error;
pub mod extraction;
pub mod model;
pub mod rule;
pub mod storage;
pub mod transform_registry;
pub mod value;

// Schema files and query strings
pub mod runtime;

// Re-export key types
pub use coerce::converty;
pub use compose::{entity as compose_entity, order_by_dependencies};
pub use config::{Defaults, Logger, RaiseLogger, TracingLogger, Violation, DEFAULT_MESSAGE};
pub use entity::Entity;
pub use error::ModelError;
pub use extraction::{Extractor, FieldPath, PathSegment};
pub use model::{MergeOptions, Model, ParseOptions, ReverseOptions};
pub use rule::{FieldMeta, HookFn, ReverseFn, Rule, Target, Transform, ValidatorFn};
pub use storage::{Attr, EntityKey, Meta, Storage};
pub use transform_registry::{TransformRegistry, ValidateFn};
pub use value::{record_to_json, FieldValue, Record, TypeSpec, ValueType};

// Re-export runtime types
pub use runtime::{parse_query, Schema, SchemaConfig};
