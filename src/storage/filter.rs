//! Equality matcher over decoded documents (embedded backend only)

use super::query::{Filter, Predicate};
use super::record::Document;

/// True when every predicate names a field present in `doc` with an equal
/// value. An empty filter matches any document.
pub fn matches(doc: &Document, filter: &Filter) -> bool {
    filter.predicates().iter().all(|predicate| match predicate {
        Predicate::Equals(field, expected) => match doc.get(*field) {
            Some(stored) => expected.matches_json(stored),
            None => false,
        },
    })
}
