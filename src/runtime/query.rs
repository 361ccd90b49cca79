//! URL query decoding.
//!
//! Query strings carry every value as text. [`parse_query`] only splits and
//! decodes them; [`Model::recover`](crate::Model::recover) restores the types.

use url::form_urlencoded;

use crate::value::{FieldValue, Record};

/// Decode `a=1&b=x%20y` into a record of strings.
///
/// A leading `?` is ignored. Repeated keys collect into a list in order of
/// appearance; keys without `=` map to `""`.
pub fn parse_query(query: &str) -> Record {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut record = Record::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let value = FieldValue::String(value.into_owned());
        match record.get_mut(key.as_ref()) {
            Some(FieldValue::List(values)) => values.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, FieldValue::Null);
                *existing = FieldValue::List(vec![first, value]);
            }
            None => {
                record.insert(key.into_owned(), value);
            }
        }
    }

    tracing::trace!(keys = record.len(), "decoded query");
    record
}
