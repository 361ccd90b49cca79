//! Per-attribute rule record.
//!
//! A [`Rule`] is the set of options governing one attribute of one entity type.
//! Rules only grow: [`Rule::merge_from`] overwrites the options the partial rule
//! sets and leaves every other option in place.

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::model::Model;
use crate::value::{FieldValue, TypeSpec};

/// Copy-in transform: `(raw value, full source) -> value`.
///
/// Used for the `parse`, `merge` and `recover` options. Returning `None`
/// leaves the value undefined.
pub type Transform =
    Arc<dyn Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> + Send + Sync>;

/// Copy-out transform: `(current value, entity) -> value`.
pub type ReverseFn = Arc<dyn Fn(Option<&FieldValue>, &Model) -> Option<FieldValue> + Send + Sync>;

/// Validator: `(current value, entity)`. Failure is signalled by the error.
pub type ValidatorFn =
    Arc<dyn Fn(Option<&FieldValue>, &Model) -> Result<(), ModelError> + Send + Sync>;

/// Custom named per-attribute function invoked by `Model::run_decorators`.
pub type HookFn = Arc<dyn Fn(&Model) -> Option<FieldValue> + Send + Sync>;

/// Output key of an attribute in `reverse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Use the attribute's own name.
    Same,
    /// Use an explicit key.
    Key(String),
}

impl Target {
    pub fn key<'a>(&'a self, attr: &'a str) -> &'a str {
        match self {
            Target::Key(key) if !key.is_empty() => key,
            _ => attr,
        }
    }
}

/// Structural metadata for column or form generation.
///
/// `prop` is stamped with the owning attribute's name when the metadata is
/// declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    #[serde(default)]
    pub prop: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, FieldValue>,
}

impl FieldMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Explicit label, else the stamped prop in Title Case.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.prop.to_case(Case::Title),
        }
    }
}

/// Options attached to one attribute
#[derive(Clone, Default)]
pub struct Rule {
    pub ty: Option<TypeSpec>,
    pub from: Option<Vec<String>>,
    pub to: Option<Target>,
    pub enumeration: Option<Vec<FieldValue>>,
    pub parse: Option<Transform>,
    pub merge: Option<Transform>,
    pub recover: Option<Transform>,
    pub reverse: Option<ReverseFn>,
    pub dep: Option<Vec<String>>,
    pub nullable: Option<bool>,
    pub validator: Option<Vec<ValidatorFn>>,
    pub omit: Option<bool>,
    pub column: Option<FieldMeta>,
    pub form: Option<FieldMeta>,
    pub hooks: IndexMap<String, HookFn>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow merge: every option set on `other` replaces the same option
    /// here. Hooks are merged by name.
    pub fn merge_from(&mut self, other: Rule) {
        overwrite(&mut self.ty, other.ty);
        overwrite(&mut self.from, other.from);
        overwrite(&mut self.to, other.to);
        overwrite(&mut self.enumeration, other.enumeration);
        overwrite(&mut self.parse, other.parse);
        overwrite(&mut self.merge, other.merge);
        overwrite(&mut self.recover, other.recover);
        overwrite(&mut self.reverse, other.reverse);
        overwrite(&mut self.dep, other.dep);
        overwrite(&mut self.nullable, other.nullable);
        overwrite(&mut self.validator, other.validator);
        overwrite(&mut self.omit, other.omit);
        overwrite(&mut self.column, other.column);
        overwrite(&mut self.form, other.form);
        self.hooks.extend(other.hooks);
    }

    pub fn is_omitted(&self) -> bool {
        self.omit == Some(true)
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable == Some(true)
    }

    pub fn deps(&self) -> &[String] {
        self.dep.as_deref().unwrap_or_default()
    }

    pub fn validators(&self) -> &[ValidatorFn] {
        self.validator.as_deref().unwrap_or_default()
    }

    /// Declared type names as shown in violation messages, empty when untyped.
    pub fn describe_type(&self) -> String {
        self.ty.as_ref().map(TypeSpec::describe).unwrap_or_default()
    }

    /// Permitted values as shown in enumeration violation messages.
    pub fn describe_enumeration(&self) -> String {
        self.enumeration
            .iter()
            .flatten()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Names of the options that are set, in declaration order of the fields.
    pub fn option_names(&self) -> Vec<&str> {
        let flags = [
            ("type", self.ty.is_some()),
            ("from", self.from.is_some()),
            ("to", self.to.is_some()),
            ("enumeration", self.enumeration.is_some()),
            ("parse", self.parse.is_some()),
            ("merge", self.merge.is_some()),
            ("recover", self.recover.is_some()),
            ("reverse", self.reverse.is_some()),
            ("dep", self.dep.is_some()),
            ("nullable", self.nullable.is_some()),
            ("validator", self.validator.is_some()),
            ("omit", self.omit.is_some()),
            ("column", self.column.is_some()),
            ("form", self.form.is_some()),
        ];
        flags
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name)
            .chain(self.hooks.keys().map(String::as_str))
            .collect()
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("type", &self.ty)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("enumeration", &self.enumeration)
            .field("dep", &self.dep)
            .field("nullable", &self.nullable)
            .field("omit", &self.omit)
            .field("column", &self.column)
            .field("form", &self.form)
            .field("options", &self.option_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    #[test]
    fn test_merge_from_is_shallow_and_additive() {
        let mut rule = Rule {
            ty: Some(ValueType::String.into()),
            from: Some(vec!["a".into()]),
            ..Rule::default()
        };

        rule.merge_from(Rule {
            from: Some(vec!["b".into()]),
            nullable: Some(true),
            ..Rule::default()
        });

        assert_eq!(rule.ty, Some(TypeSpec::Single(ValueType::String)));
        assert_eq!(rule.from, Some(vec!["b".to_string()]));
        assert!(rule.is_nullable());
        assert_eq!(rule.option_names(), vec!["type", "from", "nullable"]);
    }

    #[test]
    fn test_target_key() {
        assert_eq!(Target::Same.key("id"), "id");
        assert_eq!(Target::Key("userId".into()).key("id"), "userId");
        assert_eq!(Target::Key(String::new()).key("id"), "id");
    }

    #[test]
    fn test_describe_type_and_enumeration() {
        let rule = Rule {
            ty: Some(ValueType::String.into()),
            enumeration: Some(vec!["A".into(), "B".into()]),
            ..Rule::default()
        };
        assert_eq!(rule.describe_type(), "String");
        assert_eq!(rule.describe_enumeration(), "A, B");
        assert_eq!(Rule::default().describe_type(), "");
    }
}
