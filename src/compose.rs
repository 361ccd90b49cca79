//! Inheritance composer.
//!
//! A subtype's registry entry only lists its own attributes until it is
//! composed. Composition appends the parent's attributes the child does not
//! redeclare, then orders the list so that every attribute follows the
//! siblings named in its `dep` option.

use std::collections::HashSet;

use crate::storage::{Attr, EntityKey, Meta, Storage};

impl Storage {
    /// Pull the parent's rules into `key` and order attributes by dependency.
    ///
    /// The child's declarations win by name; there is no deep merge of rules.
    pub fn compose(&mut self, key: &EntityKey) -> &mut Meta {
        let parent = self.entity(key).parent().cloned();
        let inherited: Vec<Attr> = match parent {
            Some(parent) if &parent != key => self.attrs(&parent).to_vec(),
            _ => Vec::new(),
        };

        let meta = self.entity(key);
        let before = meta.attrs().len();
        meta.merge(inherited);
        let ordered = order_by_dependencies(meta.attrs());
        meta.replace_attrs(ordered);

        tracing::debug!(
            entity = key.name(),
            inherited = meta.attrs().len() - before,
            "composed entity"
        );
        meta
    }
}

/// Compose `key` in `storage`. See [`Storage::compose`].
pub fn entity<'a>(storage: &'a mut Storage, key: &EntityKey) -> &'a mut Meta {
    storage.compose(key)
}

/// Stable topological ordering of attributes by their `dep` option.
///
/// Each step takes the earliest remaining attribute whose dependencies are
/// already placed. Names that are not attributes of the list are ignored. When
/// a cycle leaves nothing placeable, the rest keeps its current order.
pub fn order_by_dependencies(attrs: &[Attr]) -> Vec<Attr> {
    let names: HashSet<&str> = attrs.iter().map(Attr::name).collect();
    let mut pending: Vec<&Attr> = attrs.iter().collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut sorted = Vec::with_capacity(attrs.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|attr| {
            attr.rules()
                .deps()
                .iter()
                .all(|dep| {
                    dep == attr.name()
                        || !names.contains(dep.as_str())
                        || placed.contains(dep.as_str())
                })
        });

        match ready {
            Some(index) => {
                let attr = pending.remove(index);
                placed.insert(attr.name());
                sorted.push(attr.clone());
            }
            None => {
                let cycle: Vec<&str> = pending.iter().map(|attr| attr.name()).collect();
                tracing::warn!(
                    ?cycle,
                    "circular attribute dependencies, keeping declaration order"
                );
                sorted.extend(pending.drain(..).cloned());
            }
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorators::{dep, to, ty};
    use crate::value::{TypeSpec, ValueType};

    fn names(attrs: &[Attr]) -> Vec<&str> {
        attrs.iter().map(Attr::name).collect()
    }

    fn attr(name: &str, deps: &[&str]) -> Attr {
        let mut attr = Attr::new(name);
        if !deps.is_empty() {
            attr.decorate([dep(deps.iter().copied())]);
        }
        attr
    }

    #[test]
    fn test_order_keeps_declaration_order_without_deps() {
        let attrs = vec![attr("c", &[]), attr("a", &[]), attr("b", &[])];
        assert_eq!(names(&order_by_dependencies(&attrs)), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_order_moves_dependents_after_dependencies() {
        let attrs = vec![
            attr("total", &["price", "count"]),
            attr("price", &[]),
            attr("label", &[]),
            attr("count", &["price"]),
        ];
        assert_eq!(
            names(&order_by_dependencies(&attrs)),
            vec!["price", "label", "count", "total"]
        );
    }

    #[test]
    fn test_order_ignores_unknown_deps_and_survives_cycles() {
        let attrs = vec![attr("a", &["missing"]), attr("b", &["c"]), attr("c", &["b"])];
        assert_eq!(names(&order_by_dependencies(&attrs)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_compose_inherits_parent_rules() {
        let base = EntityKey::dynamic("Base");
        let child = EntityKey::dynamic("Child");
        let mut storage = Storage::new();
        storage
            .entity(&base)
            .declare("id", [ty(ValueType::Number), to()])
            .declare("kind", [ty(ValueType::String)]);
        storage
            .entity(&child)
            .extends(base.clone())
            .declare("kind", [ty(ValueType::Number)]);

        assert_eq!(names(storage.attrs(&child)), vec!["kind"]);

        entity(&mut storage, &child);
        assert_eq!(names(storage.attrs(&child)), vec!["kind", "id"]);
        assert_eq!(
            storage.find_attr(&child, "kind").unwrap().rules().ty,
            Some(TypeSpec::Single(ValueType::Number))
        );
        // the parent is untouched
        assert_eq!(names(storage.attrs(&base)), vec!["id", "kind"]);
    }

    #[test]
    fn test_compose_without_parent_only_orders() {
        let key = EntityKey::dynamic("Solo");
        let mut storage = Storage::new();
        storage
            .entity(&key)
            .declare("b", [dep(["a"])])
            .declare("a", [to()]);

        storage.compose(&key);
        assert_eq!(names(storage.attrs(&key)), vec!["a", "b"]);
    }

    #[test]
    fn test_compose_self_parent_is_ignored() {
        let key = EntityKey::dynamic("Loop");
        let mut storage = Storage::new();
        storage.entity(&key).extends(key.clone()).declare("x", [to()]);

        storage.compose(&key);
        assert_eq!(names(storage.attrs(&key)), vec!["x"]);
    }
}
