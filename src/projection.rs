//! Wire-facing views of versioned entities
use crate::repository::{EntityKind, Live, Version};

/// Builds the response shape for an entity kind.
///
/// Every operation renders through here so create, edit, status update and
/// rollback all answer with the same fields.
pub trait Projection: EntityKind + Sized {
    type View;

    /// Renders `live`, taking content, status, version and timestamp from
    /// `snapshot` when one is given.
    fn project(live: &Live<Self>, snapshot: Option<&Version<Self>>) -> Self::View;

    fn latest(live: &Live<Self>) -> Self::View {
        Self::project(live, None)
    }

    /// One view per history row, in the order given.
    fn history(live: &Live<Self>, versions: &[Version<Self>]) -> Vec<Self::View> {
        versions
            .iter()
            .map(|row| Self::project(live, Some(row)))
            .collect()
    }
}
