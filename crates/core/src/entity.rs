//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Collections in the authorization catalog are keyed by this identity when
/// entries are merged or replaced.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Replace the entry with the same identity as `entity`, or append it.
///
/// Returns `true` when an existing entry was replaced.
pub fn upsert<E: Entity>(items: &mut Vec<E>, entity: E) -> bool {
    match items.iter().position(|existing| existing.id() == entity.id()) {
        Some(idx) => {
            items[idx] = entity;
            true
        }
        None => {
            items.push(entity);
            false
        }
    }
}
