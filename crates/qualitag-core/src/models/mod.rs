//! Domain records for the five Qualitag collections
//!
//! Every record is owned by exactly one collection and references other
//! records only by id. Relationship fields are kept consistent by the
//! [`RelationshipLinker`](crate::linker::RelationshipLinker).

mod artifact;
mod project;
mod record;
mod tag;
mod team;
mod user;

pub use artifact::*;
pub use project::*;
pub use record::*;
pub use tag::*;
pub use team::*;
pub use user::*;

/// Add `id` to an id list, preserving order. Returns whether the list changed.
pub(crate) fn add_id(ids: &mut Vec<String>, id: &str) -> bool {
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_string());
    true
}

/// Remove every occurrence of `id` from an id list. Returns whether the list changed.
pub(crate) fn remove_id(ids: &mut Vec<String>, id: &str) -> bool {
    let before = ids.len();
    ids.retain(|existing| existing != id);
    ids.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_id_is_idempotent() {
        let mut ids = vec!["a".to_string()];
        assert!(add_id(&mut ids, "b"));
        assert!(!add_id(&mut ids, "b"));
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_id_missing_is_noop() {
        let mut ids = vec!["a".to_string()];
        assert!(!remove_id(&mut ids, "z"));
        assert!(remove_id(&mut ids, "a"));
        assert!(ids.is_empty());
    }
}
