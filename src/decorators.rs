//! Rule declaration API.
//!
//! Every function here returns a [`Decorator`] that sets exactly one option on
//! the attribute it is applied to. Decorators compose freely:
//!
//! ```
//! use modelmap::decorators::{from, to_key, ty};
//! use modelmap::{EntityKey, Storage, ValueType};
//!
//! let user = EntityKey::dynamic("User");
//! let mut storage = Storage::new();
//! storage
//!     .entity(&user)
//!     .declare("age", [from("profile.age"), ty(ValueType::Number)])
//!     .declare("id", [to_key("id"), ty(ValueType::Number)]);
//! ```

use indexmap::IndexMap;
use std::sync::Arc;

use crate::config::Defaults;
use crate::error::ModelError;
use crate::model::Model;
use crate::rule::{FieldMeta, Rule, Target, ValidatorFn};
use crate::storage::Attr;
use crate::value::{FieldValue, TypeSpec, ValueType};

/// Deferred rule option, applied to one attribute
pub struct Decorator {
    build: Box<dyn FnOnce(&str) -> Rule>,
}

impl Decorator {
    /// Build the partial rule from the attribute's name when applied.
    pub fn new<F>(build: F) -> Self
    where
        F: FnOnce(&str) -> Rule + 'static,
    {
        Self {
            build: Box::new(build),
        }
    }

    fn option(rule: Rule) -> Self {
        Self::new(move |_| rule)
    }

    pub fn apply(self, attr: &mut Attr) {
        let rule = (self.build)(attr.name());
        attr.set_rule(rule);
    }
}

/// Apply an arbitrary partial rule.
pub fn decorators(rule: Rule) -> Decorator {
    Decorator::option(rule)
}

/// Expected type, or a union when given a `Vec<ValueType>`.
pub fn ty(spec: impl Into<TypeSpec>) -> Decorator {
    Decorator::option(Rule {
        ty: Some(spec.into()),
        ..Rule::default()
    })
}

/// Union of acceptable types; the first one drives `recover` coercion.
pub fn one_of<I>(types: I) -> Decorator
where
    I: IntoIterator<Item = ValueType>,
{
    ty(TypeSpec::Union(types.into_iter().collect()))
}

/// Source path, dot separated for nested lookup.
pub fn from(path: impl Into<String>) -> Decorator {
    from_any([path.into()])
}

/// Candidate source paths, tried in order.
pub fn from_any<I, S>(paths: I) -> Decorator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Decorator::option(Rule {
        from: Some(paths.into_iter().map(Into::into).collect()),
        ..Rule::default()
    })
}

/// Include the attribute in `reverse` under its own name.
pub fn to() -> Decorator {
    Decorator::option(Rule {
        to: Some(Target::Same),
        ..Rule::default()
    })
}

/// Include the attribute in `reverse` under `key`.
pub fn to_key(key: impl Into<String>) -> Decorator {
    Decorator::option(Rule {
        to: Some(Target::Key(key.into())),
        ..Rule::default()
    })
}

pub fn enumeration<I, V>(values: I) -> Decorator
where
    I: IntoIterator<Item = V>,
    V: Into<FieldValue>,
{
    Decorator::option(Rule {
        enumeration: Some(values.into_iter().map(Into::into).collect()),
        ..Rule::default()
    })
}

/// Transform applied by `parse` to the resolved raw value.
pub fn parse<F>(transform: F) -> Decorator
where
    F: Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> + Send + Sync + 'static,
{
    Decorator::option(Rule {
        parse: Some(Arc::new(transform)),
        ..Rule::default()
    })
}

/// Alias of [`parse`].
pub fn format<F>(transform: F) -> Decorator
where
    F: Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> + Send + Sync + 'static,
{
    parse(transform)
}

/// Transform applied by `merge` and same-entity copies.
pub fn merge<F>(transform: F) -> Decorator
where
    F: Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> + Send + Sync + 'static,
{
    Decorator::option(Rule {
        merge: Some(Arc::new(transform)),
        ..Rule::default()
    })
}

/// Transform applied by `recover` instead of type coercion.
pub fn recover<F>(transform: F) -> Decorator
where
    F: Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> + Send + Sync + 'static,
{
    Decorator::option(Rule {
        recover: Some(Arc::new(transform)),
        ..Rule::default()
    })
}

/// Transform applied by `reverse` to the current value.
pub fn reverse<F>(transform: F) -> Decorator
where
    F: Fn(Option<&FieldValue>, &Model) -> Option<FieldValue> + Send + Sync + 'static,
{
    Decorator::option(Rule {
        reverse: Some(Arc::new(transform)),
        ..Rule::default()
    })
}

/// Sibling attributes this one depends on.
pub fn dep<I, S>(attrs: I) -> Decorator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Decorator::option(Rule {
        dep: Some(attrs.into_iter().map(Into::into).collect()),
        ..Rule::default()
    })
}

/// Allow a missing or null value.
pub fn nullable() -> Decorator {
    nullable_if(true)
}

pub fn nullable_if(value: bool) -> Decorator {
    Decorator::option(Rule {
        nullable: Some(value),
        ..Rule::default()
    })
}

/// Single validator, run after every attribute has been assigned.
pub fn validator<F>(check: F) -> Decorator
where
    F: Fn(Option<&FieldValue>, &Model) -> Result<(), ModelError> + Send + Sync + 'static,
{
    validators(vec![Arc::new(check) as ValidatorFn])
}

/// Ordered validators for one attribute.
pub fn validators(checks: Vec<ValidatorFn>) -> Decorator {
    Decorator::option(Rule {
        validator: Some(checks),
        ..Rule::default()
    })
}

/// Skip the attribute on copy-in and copy-out.
pub fn omit() -> Decorator {
    omit_if(true)
}

pub fn omit_if(value: bool) -> Decorator {
    Decorator::option(Rule {
        omit: Some(value),
        ..Rule::default()
    })
}

/// Column metadata, stamped with the attribute name.
pub fn column(meta: FieldMeta) -> Decorator {
    Decorator::new(move |name| Rule {
        column: Some(stamp(meta, name)),
        ..Rule::default()
    })
}

/// Form metadata, stamped with the attribute name.
pub fn form(meta: FieldMeta) -> Decorator {
    Decorator::new(move |name| Rule {
        form: Some(stamp(meta, name)),
        ..Rule::default()
    })
}

fn stamp(mut meta: FieldMeta, name: &str) -> FieldMeta {
    meta.prop = name.to_string();
    meta
}

/// Custom named function, invoked through `Model::run_decorators(name)`.
pub fn hook<F>(name: impl Into<String>, call: F) -> Decorator
where
    F: Fn(&Model) -> Option<FieldValue> + Send + Sync + 'static,
{
    let mut hooks = IndexMap::new();
    hooks.insert(name.into(), Arc::new(call) as crate::rule::HookFn);
    Decorator::option(Rule {
        hooks,
        ..Rule::default()
    })
}

/// Check the runtime types of a method's positional arguments.
///
/// Only truthy arguments are compared. Mismatches, and calls without any
/// argument, are reported through the configured logger.
pub fn param(
    defaults: &Defaults,
    target: &str,
    method: &str,
    expected: &[ValueType],
    args: &[FieldValue],
) -> Result<(), ModelError> {
    if expected.is_empty() {
        return Ok(());
    }
    let need = expected
        .iter()
        .map(ValueType::name)
        .collect::<Vec<_>>()
        .join(", ");

    if args.is_empty() {
        return defaults
            .logger
            .error(&format!("{}.{}({}) got undefined", target, method, need));
    }

    let mismatch = expected.iter().zip(args).any(|(ty, arg)| {
        arg.is_truthy() && arg.value_type().as_ref() != Some(ty)
    });
    if mismatch {
        let real = args
            .iter()
            .map(|arg| {
                arg.value_type()
                    .map_or_else(|| "null".to_string(), |t| t.name().to_string())
            })
            .collect::<Vec<_>>()
            .join(", ");
        return defaults
            .logger
            .error(&format!("{}.{}({} <> {})", target, method, real, need));
    }
    Ok(())
}
