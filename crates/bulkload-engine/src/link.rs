//! Windowed one-to-many relationship linking.
//!
//! Parent `i` is linked to the children at positions `[i * window, (i + 1) * window)` of the
//! child list, clamped to its length. Parents past the end of the children get an empty window.

use serde_json::Value;
use tracing::{info, instrument};

use bulkload_core::{DocumentId, FieldUpdate, Namespace};
use bulkload_store::DocumentStore;

use crate::batch::BatchEngine;
use crate::error::Result;

/// Pair each parent with its window of children.
///
/// Deterministic: the same inputs always produce the same assignment, and every child is
/// assigned to at most one parent.
pub fn assign_windows<'a, P, C>(
    parents: &'a [P],
    children: &'a [C],
    window: usize,
) -> impl Iterator<Item = (&'a P, &'a [C])> + 'a {
    let len = children.len();
    parents.iter().enumerate().map(move |(i, parent)| {
        let start = i.checked_mul(window).map_or(len, |start| start.min(len));
        let end = start.saturating_add(window).min(len);
        (parent, &children[start..end])
    })
}

/// Counts reported by [`BatchEngine::link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    /// Parents that received an update (including those given an empty window).
    pub parents: usize,
    /// Children assigned to some parent.
    pub linked_children: usize,
    /// Parent documents the store matched.
    pub matched: u64,
}

impl<S: DocumentStore + ?Sized> BatchEngine<S> {
    /// Set `field` on each parent in `parents_ns` to the identifiers of its window of
    /// `children`.
    ///
    /// Updates are issued in requests of `update_batch_size` with the same throttle handling as
    /// any other write. Both lists should be in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the first update failure; earlier requests stay applied.
    #[instrument(
        skip(self, parents, children),
        fields(namespace = %parents_ns, parents = parents.len(), children = children.len())
    )]
    pub async fn link(
        &self,
        parents_ns: &Namespace,
        parents: &[DocumentId],
        children: &[DocumentId],
        window: usize,
        field: &str,
    ) -> Result<LinkReport> {
        let mut linked_children = 0;
        let updates: Vec<FieldUpdate> = assign_windows(parents, children, window)
            .map(|(parent, linked)| {
                linked_children += linked.len();
                let ids = linked.iter().map(|id| Value::String(id.to_string())).collect();
                FieldUpdate::set(*parent, field, Value::Array(ids))
            })
            .collect();

        let matched = self.update_batch(parents_ns, updates).await?;
        info!(matched, linked_children, "Linked relationships");
        Ok(LinkReport {
            parents: parents.len(),
            linked_children,
            matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_windows() {
        let parents: Vec<u32> = (0..100).collect();
        let children: Vec<u32> = (0..1000).collect();

        let windows: Vec<_> = assign_windows(&parents, &children, 10).collect();
        assert_eq!(windows.len(), 100);
        for (i, (parent, linked)) in windows.iter().enumerate() {
            assert_eq!(**parent as usize, i);
            let expected: Vec<u32> = (i as u32 * 10..i as u32 * 10 + 10).collect();
            assert_eq!(*linked, expected.as_slice());
        }
    }

    #[test]
    fn short_children_clamp_and_leave_empty_windows() {
        let parents = ["a", "b", "c", "d"];
        let children = [1, 2, 3, 4, 5];

        let windows: Vec<_> = assign_windows(&parents, &children, 2)
            .map(|(p, c)| (*p, c.to_vec()))
            .collect();
        assert_eq!(
            windows,
            vec![
                ("a", vec![1, 2]),
                ("b", vec![3, 4]),
                ("c", vec![5]),
                ("d", vec![]),
            ]
        );
    }

    #[test]
    fn no_child_is_assigned_twice() {
        let parents: Vec<u32> = (0..7).collect();
        let children: Vec<u32> = (0..30).collect();

        let mut seen: Vec<u32> = assign_windows(&parents, &children, 4)
            .flat_map(|(_, c)| c.iter().copied())
            .collect();
        let total = seen.len();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(total, 28);
    }

    #[test]
    fn zero_window_links_nothing() {
        let parents = [1, 2];
        let children = [1, 2, 3];
        assert!(assign_windows(&parents, &children, 0).all(|(_, c)| c.is_empty()));
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let parents = [1, 2, 3];
        let children = [1, 2, 3];
        let sizes: Vec<usize> = assign_windows(&parents, &children, usize::MAX)
            .map(|(_, c)| c.len())
            .collect();
        assert_eq!(sizes, vec![3, 0, 0]);
    }
}
