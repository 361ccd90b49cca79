//! Core entity trait for typed rule declarations.
//!
//! Rust has no field annotations that run at type definition time, so a type
//! declares its rules in [`Entity::declare`] and is registered once with
//! [`Storage::register`](crate::Storage::register).

use crate::storage::{EntityKey, Meta};

/// Marker trait for entity types declared in Rust.
///
/// # Example
///
/// ```
/// use modelmap::decorators::{from, nullable, to_key, ty};
/// use modelmap::{Entity, Meta, Model, Storage, ValueType};
/// use serde_json::json;
///
/// struct User;
///
/// impl Entity for User {
///     const NAME: &'static str = "User";
///
///     fn declare(meta: &mut Meta) {
///         meta.declare("name", [ty(ValueType::String), nullable()])
///             .declare("age", [from("profile.age"), ty(ValueType::Number)])
///             .declare("id", [to_key("id"), ty(ValueType::Number)]);
///     }
/// }
///
/// let mut storage = Storage::new();
/// storage.register::<User>();
/// let storage = storage.into_shared();
///
/// let source = json!({"id": 1, "profile": {"age": 30}}).into();
/// let user = Model::of::<User>(&storage, Some(&source)).unwrap();
/// assert_eq!(user.reverse().len(), 1);
/// ```
pub trait Entity: 'static {
    /// The name of this entity type
    const NAME: &'static str;

    /// Parent type. Its template fields are always inherited; its rules only
    /// after [`Storage::compose`](crate::Storage::compose).
    fn parent() -> Option<EntityKey> {
        None
    }

    /// Declare attribute rules and template fields.
    fn declare(meta: &mut Meta);

    /// Registry key of this type
    fn key() -> EntityKey
    where
        Self: Sized,
    {
        EntityKey::of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorators::{to, ty};
    use crate::storage::Storage;
    use crate::value::ValueType;

    struct Base;
    struct Child;

    impl Entity for Base {
        const NAME: &'static str = "Base";

        fn declare(meta: &mut Meta) {
            meta.declare("id", [ty(ValueType::Number), to()]);
        }
    }

    impl Entity for Child {
        const NAME: &'static str = "Child";

        fn parent() -> Option<EntityKey> {
            Some(Base::key())
        }

        fn declare(meta: &mut Meta) {
            meta.declare("name", [ty(ValueType::String)]).field("name", "");
        }
    }

    #[test]
    fn test_register_records_parent_and_rules() {
        let mut storage = Storage::new();
        let base = storage.register::<Base>();
        let child = storage.register::<Child>();

        assert_eq!(base, Base::key());
        assert_eq!(child.name(), "Child");
        let meta = storage.get(&child).unwrap();
        assert_eq!(meta.parent(), Some(&base));
        assert_eq!(meta.attrs().len(), 1);
        assert_eq!(meta.fields()["name"], crate::value::FieldValue::from(""));
    }

    #[test]
    fn test_type_keys_are_distinct() {
        assert_ne!(Base::key(), Child::key());
        assert_eq!(Base::key(), EntityKey::of::<Base>());
    }
}
